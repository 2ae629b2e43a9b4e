// SPDX-License-Identifier: MIT OR Apache-2.0

//! Apple key map database and aggregator.
//!
//! Every keyboard driver owns one key strokes buffer in the database and
//! overwrites it with the keys currently held on its device. Consumers such
//! as the Apple Event driver see the union of all buffers through the
//! aggregator.
//!
//! [`KeyStrokeRegistry`] holds the buffers, [`KeyMapInterface`] publishes it
//! as the two firmware protocols, and [`KeyMapDatabase`] and
//! [`KeyMapAggregator`] are the consumer-side wrappers around the published
//! tables.

mod interface;
mod protocol;
mod registry;

pub use interface::KeyMapInterface;
pub use protocol::{KeyMapAggregator, KeyMapDatabase};
pub use registry::KeyStrokeRegistry;

pub use apple_raw::protocol::key_map::{
    apple_keyboard_key, AppleKeyCode, AppleModifierMap, APPLE_HID_USAGE_KEYBOARD,
    APPLE_KEY_CAPS_LOCK,
};

use crate::Result;
use alloc::vec::Vec;

/// Index assigned to the first key strokes buffer of a session. Later
/// buffers count up from here and indices are never reused.
pub const KEY_STROKES_BUFFER_BASE_INDEX: usize = 3000;

/// Snapshot of the keys held on all keyboards.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeyStrokes {
    /// Modifiers held on any keyboard.
    pub modifiers: AppleModifierMap,
    /// Held keys, without duplicates.
    pub keys: Vec<AppleKeyCode>,
}

impl KeyStrokes {
    /// Returns true if `key` is held.
    #[must_use]
    pub fn contains(&self, key: AppleKeyCode) -> bool {
        self.keys.contains(&key)
    }

    /// Checks a key combination against this snapshot.
    ///
    /// Every key in `keys` must be held. With `exact_match` the held
    /// modifiers must equal `modifiers` and no other key may be held;
    /// otherwise `modifiers` only has to be a subset of the held modifiers.
    #[must_use]
    pub fn matches(
        &self,
        modifiers: AppleModifierMap,
        keys: &[AppleKeyCode],
        exact_match: bool,
    ) -> bool {
        if !keys.iter().all(|&key| self.contains(key)) {
            return false;
        }

        if exact_match {
            self.modifiers == modifiers && self.keys.len() == keys.len()
        } else {
            self.modifiers.contains(modifiers)
        }
    }
}

/// Source of key stroke snapshots, sampled by the Apple Event driver.
pub trait KeyStrokeSource {
    /// Returns the keys currently held.
    ///
    /// # Errors
    ///
    /// * `Status::OUT_OF_RESOURCES` The snapshot could not be allocated.
    /// * Any error reported by the underlying protocol.
    fn key_strokes(&mut self) -> Result<KeyStrokes>;
}
