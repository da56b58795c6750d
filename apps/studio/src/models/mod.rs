pub mod entity;
pub mod project;
pub mod shot;
