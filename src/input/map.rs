// Per-frame aggregation of input values across all sources

use super::Player;
use crate::value::{magnitude, to_normalized};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;

/// Aggregated input values for one update cycle
///
/// Holds one value per (player, identifier). Several sources may drive the
/// same identifier; the value with the largest magnitude wins, so a weak
/// keyboard tap never hides a full gamepad deflection or the other way around.
#[derive(Debug, Clone)]
pub struct InputMap<T> {
    /// player -> identifier -> value
    values: HashMap<Player, HashMap<T, i16>>,
}

impl<T: Eq + Hash> InputMap<T> {
    /// Create an empty input map
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Record a value for an input
    ///
    /// Only input sources should call this, while updating. The first write
    /// to a slot always sticks; later writes replace it only when their
    /// absolute value is strictly larger. With 100 stored, writing 200 gives
    /// 200, writing -300 gives -300 and writing 50 or -100 keeps 100.
    pub fn set(&mut self, player: Player, identifier: T, value: i16) {
        match self.values.entry(player).or_default().entry(identifier) {
            Entry::Occupied(mut slot) => {
                if magnitude(value) > magnitude(*slot.get()) {
                    slot.insert(value);
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
        }
    }

    /// Get the value of an input, 0 if nothing wrote to it
    pub fn get(&self, player: Player, identifier: &T) -> i16 {
        self.values
            .get(&player)
            .and_then(|inputs| inputs.get(identifier))
            .copied()
            .unwrap_or(0)
    }

    /// Get the value of an input scaled to -1.0..=1.0
    pub fn get_normalized(&self, player: Player, identifier: &T) -> f32 {
        to_normalized(self.get(player, identifier))
    }

    /// Check if an input has a non-zero value
    pub fn is_active(&self, player: Player, identifier: &T) -> bool {
        self.get(player, identifier) != 0
    }

    /// Players that received at least one value
    pub fn players(&self) -> impl Iterator<Item = Player> + '_ {
        self.values.keys().copied()
    }

    /// All values recorded for a player
    pub fn iter_player(&self, player: Player) -> impl Iterator<Item = (&T, i16)> + '_ {
        self.values
            .get(&player)
            .into_iter()
            .flat_map(|inputs| inputs.iter().map(|(id, value)| (id, *value)))
    }

    /// Number of (player, identifier) slots written
    pub fn len(&self) -> usize {
        self.values.values().map(HashMap::len).sum()
    }

    /// Check if nothing has been written
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: Eq + Hash> Default for InputMap<T> {
    fn default() -> Self {
        Self::new()
    }
}
