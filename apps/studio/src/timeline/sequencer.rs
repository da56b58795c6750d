//! Shot sequencer: owns the ordered shot list of one episode.
//!
//! Every structural change ends in a full `resequence`, so `sequence`
//! always reads 1..=N in array order. Out-of-range positions are no-ops.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::StoryboardError;
use crate::models::shot::{Shot, ShotPatch, ShotSeed};

/// Anything kept in a 1-based contiguous order.
pub trait Sequenced {
    fn id(&self) -> &str;
    fn set_sequence(&mut self, sequence: u32);
}

impl Sequenced for Shot {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_sequence(&mut self, sequence: u32) {
        self.sequence = sequence;
    }
}

/// Rewrites every sequence number from array position.
pub fn resequence<T: Sequenced>(items: &mut [T]) {
    for (i, item) in items.iter_mut().enumerate() {
        item.set_sequence(i as u32 + 1);
    }
}

/// Moves one element from `from` to `to`, shifting the ones in between.
pub fn reorder<T: Sequenced>(items: &mut Vec<T>, from: usize, to: usize) -> bool {
    if from >= items.len() || to >= items.len() {
        return false;
    }
    if from != to {
        let item = items.remove(from);
        items.insert(to, item);
    }
    resequence(items);
    true
}

/// Rejects lists that reuse an id.
pub fn ensure_unique_ids<T: Sequenced>(items: &[T]) -> Result<(), StoryboardError> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        if !seen.insert(item.id()) {
            return Err(StoryboardError::Validation(format!(
                "duplicate id '{}' in ordered list",
                item.id()
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Shot>", into = "Vec<Shot>")]
pub struct ShotSequence {
    pub(super) shots: Vec<Shot>,
}

impl TryFrom<Vec<Shot>> for ShotSequence {
    type Error = StoryboardError;

    /// Load path: validates ids, backfills history, then resequences.
    fn try_from(mut shots: Vec<Shot>) -> Result<Self, Self::Error> {
        ensure_unique_ids(&shots)?;
        let backfilled = shots
            .iter_mut()
            .map(|s| s.backfill_history())
            .filter(|changed| *changed)
            .count();
        if backfilled > 0 {
            debug!("Backfilled visual history for {backfilled} shot(s)");
        }
        resequence(&mut shots);
        Ok(Self { shots })
    }
}

impl From<ShotSequence> for Vec<Shot> {
    fn from(sequence: ShotSequence) -> Self {
        sequence.shots
    }
}

impl ShotSequence {
    pub fn shots(&self) -> &[Shot] {
        &self.shots
    }

    pub fn len(&self) -> usize {
        self.shots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shots.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Shot> {
        self.shots.iter().find(|s| s.id == id)
    }

    /// Mutable access for the visual history store. Structural fields are
    /// re-derived on the next structural change regardless.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Shot> {
        self.shots.iter_mut().find(|s| s.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.shots.iter().position(|s| s.id == id)
    }

    pub fn append(&mut self, seed: ShotSeed) -> &Shot {
        let mut shot = Shot::from_seed(seed);
        shot.sequence = self.shots.len() as u32 + 1;
        self.shots.push(shot);
        &self.shots[self.shots.len() - 1]
    }

    /// Clones the shot at `index` into a new shot placed right after it.
    pub fn insert_after(&mut self, index: usize) -> Option<&Shot> {
        let seed = self.shots.get(index)?.to_seed();
        self.shots.insert(index + 1, Shot::from_seed(seed));
        resequence(&mut self.shots);
        self.shots.get(index + 1)
    }

    pub fn remove(&mut self, id: &str) -> Option<Shot> {
        let index = self.position(id)?;
        let removed = self.shots.remove(index);
        resequence(&mut self.shots);
        Some(removed)
    }

    /// Exchanges whole records, so identity moves with position.
    pub fn swap(&mut self, i: usize, j: usize) -> bool {
        if i >= self.shots.len() || j >= self.shots.len() {
            return false;
        }
        self.shots.swap(i, j);
        resequence(&mut self.shots);
        true
    }

    pub fn reorder(&mut self, from: usize, to: usize) -> bool {
        reorder(&mut self.shots, from, to)
    }

    pub fn update(&mut self, id: &str, patch: ShotPatch) -> bool {
        match self.get_mut(id) {
            Some(shot) => {
                shot.apply_patch(patch);
                true
            }
            None => false,
        }
    }
}
