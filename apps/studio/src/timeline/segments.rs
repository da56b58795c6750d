//! Environment Segmentation Engine.
//!
//! Segments are never stored. They are recomputed from the shot order on
//! every read, and the edit operations below only rewrite `environment_id`
//! on individual shots.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::shot::Shot;
use crate::timeline::sequencer::ShotSequence;

/// Used for `insert_break` when a project has fewer than two environments.
pub const DEFAULT_BREAK_ENVIRONMENTS: [&str; 2] = ["e1", "e2"];

/// A maximal run of adjacent shots sharing one environment reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub environment_id: Option<String>,
    pub start_index: usize,
    pub count: usize,
}

impl Segment {
    pub fn end_index(&self) -> usize {
        self.start_index + self.count - 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeAction {
    Expand,
    Shrink,
}

/// Run-length groups `shots` by environment in one pass.
pub fn compute_segments(shots: &[Shot]) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    for (index, shot) in shots.iter().enumerate() {
        match segments.last_mut() {
            Some(current) if current.environment_id == shot.environment_id => current.count += 1,
            _ => segments.push(Segment {
                environment_id: shot.environment_id.clone(),
                start_index: index,
                count: 1,
            }),
        }
    }
    segments
}

impl ShotSequence {
    pub fn segments(&self) -> Vec<Segment> {
        compute_segments(&self.shots)
    }

    /// Moves one edge of `segment` by a single shot. Returns whether a shot
    /// changed; stale segments and boundary cases are no-ops.
    pub fn resize_segment(&mut self, segment: &Segment, edge: Edge, action: ResizeAction) -> bool {
        if !self.segments().contains(segment) {
            debug!(
                "Ignoring resize of stale segment at {} (count {})",
                segment.start_index, segment.count
            );
            return false;
        }

        let target = match (edge, action) {
            (Edge::Left, ResizeAction::Expand) => segment.start_index.checked_sub(1),
            (Edge::Right, ResizeAction::Expand) => {
                Some(segment.end_index() + 1).filter(|&i| i < self.shots.len())
            }
            (_, ResizeAction::Shrink) if segment.count < 2 => None,
            (Edge::Left, ResizeAction::Shrink) => Some(segment.start_index),
            (Edge::Right, ResizeAction::Shrink) => Some(segment.end_index()),
        };
        let Some(index) = target else {
            return false;
        };

        self.shots[index].environment_id = match action {
            ResizeAction::Expand => segment.environment_id.clone(),
            ResizeAction::Shrink => None,
        };
        true
    }

    /// Forces a boundary at `index` by flipping that shot between the two
    /// break environments.
    pub fn insert_break(&mut self, index: usize, alternates: [&str; 2]) -> bool {
        let Some(shot) = self.shots.get_mut(index) else {
            return false;
        };
        let next = if shot.environment_id.as_deref() == Some(alternates[0]) {
            alternates[1]
        } else {
            alternates[0]
        };
        shot.environment_id = Some(next.to_string());
        true
    }
}
