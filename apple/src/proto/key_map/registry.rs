// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{
    AppleKeyCode, AppleModifierMap, KeyStrokeSource, KeyStrokes, KEY_STROKES_BUFFER_BASE_INDEX,
};
use crate::{Error, Result, Status};
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use log::{debug, trace};

/// One keyboard's slot in the database.
#[derive(Debug)]
struct KeyStrokesBuffer {
    modifiers: AppleModifierMap,
    key_count: usize,
    /// Allocated to the declared capacity. Only the first `key_count` slots
    /// are meaningful.
    keys: Vec<AppleKeyCode>,
}

impl KeyStrokesBuffer {
    fn with_capacity(capacity: usize) -> Result<Self> {
        let mut keys = Vec::new();
        keys.try_reserve_exact(capacity)
            .map_err(|_| Status::OUT_OF_RESOURCES)?;
        keys.resize(capacity, 0);
        Ok(Self {
            modifiers: AppleModifierMap::empty(),
            key_count: 0,
            keys,
        })
    }

    fn held_keys(&self) -> &[AppleKeyCode] {
        &self.keys[..self.key_count]
    }
}

/// The key strokes buffers of all keyboards, addressed by index.
#[derive(Debug)]
pub struct KeyStrokeRegistry {
    buffers: BTreeMap<usize, KeyStrokesBuffer>,
    next_index: usize,
}

impl Default for KeyStrokeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStrokeRegistry {
    /// Creates an empty registry. The first buffer gets
    /// [`KEY_STROKES_BUFFER_BASE_INDEX`].
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buffers: BTreeMap::new(),
            next_index: KEY_STROKES_BUFFER_BASE_INDEX,
        }
    }

    /// Number of live buffers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Returns true if no buffer exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Creates a buffer holding up to `capacity` keys and returns its index.
    ///
    /// # Errors
    ///
    /// * `Status::OUT_OF_RESOURCES` The buffer could not be allocated. No
    ///   index is consumed.
    pub fn create_buffer(&mut self, capacity: usize) -> Result<usize> {
        let buffer = KeyStrokesBuffer::with_capacity(capacity)?;

        let index = self.next_index;
        self.next_index += 1;
        self.buffers.insert(index, buffer);

        debug!("created key strokes buffer {index} for {capacity} keys");
        Ok(index)
    }

    /// Removes the buffer at `index`.
    ///
    /// # Errors
    ///
    /// * `Status::NOT_FOUND` No buffer has this index.
    pub fn remove_buffer(&mut self, index: usize) -> Result {
        self.buffers.remove(&index).ok_or(Status::NOT_FOUND)?;
        debug!("removed key strokes buffer {index}");
        Ok(())
    }

    /// Replaces the modifiers and held keys stored at `index`.
    ///
    /// # Errors
    ///
    /// * `Status::NOT_FOUND` No buffer has this index.
    /// * `Status::OUT_OF_RESOURCES` `keys` does not fit the capacity declared
    ///   when the buffer was created. The buffer is left unchanged.
    pub fn set_keys(
        &mut self,
        index: usize,
        modifiers: AppleModifierMap,
        keys: &[AppleKeyCode],
    ) -> Result {
        let buffer = self.buffers.get_mut(&index).ok_or(Status::NOT_FOUND)?;

        if keys.len() > buffer.keys.len() {
            debug!(
                "key strokes buffer {index}: {} keys exceed capacity {}",
                keys.len(),
                buffer.keys.len()
            );
            return Err(Status::OUT_OF_RESOURCES.into());
        }

        buffer.keys[..keys.len()].copy_from_slice(keys);
        buffer.key_count = keys.len();
        buffer.modifiers = modifiers;

        trace!("key strokes buffer {index}: {modifiers:?} {keys:x?}");
        Ok(())
    }

    /// Modifiers held on any keyboard.
    #[must_use]
    pub fn modifiers(&self) -> AppleModifierMap {
        self.buffers
            .values()
            .fold(AppleModifierMap::empty(), |acc, buffer| acc | buffer.modifiers)
    }

    /// Distinct held keys in buffer index order, then slot order.
    fn held_keys(&self) -> impl Iterator<Item = AppleKeyCode> + '_ {
        let all = move || {
            self.buffers
                .values()
                .flat_map(KeyStrokesBuffer::held_keys)
                .copied()
        };
        all()
            .enumerate()
            .filter(move |&(position, key)| all().position(|other| other == key) == Some(position))
            .map(|(_, key)| key)
    }

    /// Copies the held keys into `key_codes` and returns the held modifiers
    /// and the number of keys written.
    ///
    /// Callers that do not know the number of held keys first call with
    /// `None` (or a buffer that is too small) to learn it, then again with a
    /// buffer of that size.
    ///
    /// # Errors
    ///
    /// * `Status::BUFFER_TOO_SMALL` `key_codes` cannot hold all keys. The
    ///   error data is the required number of key codes.
    pub fn get_key_strokes(
        &self,
        key_codes: Option<&mut [AppleKeyCode]>,
    ) -> Result<(AppleModifierMap, usize), Option<usize>> {
        let required = self.held_keys().count();
        let key_codes = key_codes.unwrap_or_default();

        if key_codes.len() < required {
            return Err(Error::new(Status::BUFFER_TOO_SMALL, Some(required)));
        }

        for (slot, key) in key_codes.iter_mut().zip(self.held_keys()) {
            *slot = key;
        }
        Ok((self.modifiers(), required))
    }

    /// Returns an owned snapshot of the held modifiers and keys.
    ///
    /// # Errors
    ///
    /// * `Status::OUT_OF_RESOURCES` The snapshot could not be allocated.
    pub fn snapshot(&self) -> Result<KeyStrokes> {
        let mut keys = Vec::new();
        keys.try_reserve_exact(self.held_keys().count())
            .map_err(|_| Status::OUT_OF_RESOURCES)?;
        keys.extend(self.held_keys());

        Ok(KeyStrokes {
            modifiers: self.modifiers(),
            keys,
        })
    }

    /// Checks whether a key combination is currently held.
    ///
    /// See [`KeyStrokes::matches`] for the matching rules.
    ///
    /// # Errors
    ///
    /// * `Status::NOT_FOUND` The combination is not held.
    /// * `Status::OUT_OF_RESOURCES` The snapshot could not be allocated.
    pub fn contains_key_strokes(
        &self,
        modifiers: AppleModifierMap,
        keys: &[AppleKeyCode],
        exact_match: bool,
    ) -> Result {
        if self.snapshot()?.matches(modifiers, keys, exact_match) {
            Ok(())
        } else {
            Err(Status::NOT_FOUND.into())
        }
    }
}

impl KeyStrokeSource for KeyStrokeRegistry {
    fn key_strokes(&mut self) -> Result<KeyStrokes> {
        self.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::key_map::apple_keyboard_key;
    use alloc::vec;

    const KEY_A: AppleKeyCode = apple_keyboard_key(0x04);
    const KEY_B: AppleKeyCode = apple_keyboard_key(0x05);
    const KEY_C: AppleKeyCode = apple_keyboard_key(0x06);

    #[test]
    fn test_indices_are_never_reused() {
        let mut registry = KeyStrokeRegistry::new();

        let first = registry.create_buffer(5).unwrap();
        assert_eq!(first, 3000);
        registry.remove_buffer(first).unwrap();

        let second = registry.create_buffer(3).unwrap();
        assert_eq!(second, 3001);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_unknown_buffer() {
        let mut registry = KeyStrokeRegistry::new();
        let index = registry.create_buffer(1).unwrap();
        registry.remove_buffer(index).unwrap();

        assert_eq!(
            registry.remove_buffer(index).unwrap_err().status(),
            Status::NOT_FOUND
        );
        assert_eq!(
            registry
                .set_keys(index, AppleModifierMap::empty(), &[])
                .unwrap_err()
                .status(),
            Status::NOT_FOUND
        );
    }

    #[test]
    fn test_set_keys_over_capacity_keeps_record() {
        let mut registry = KeyStrokeRegistry::new();
        let index = registry.create_buffer(2).unwrap();
        registry
            .set_keys(index, AppleModifierMap::LEFT_SHIFT, &[KEY_A])
            .unwrap();

        let err = registry
            .set_keys(index, AppleModifierMap::LEFT_COMMAND, &[KEY_A, KEY_B, KEY_C])
            .unwrap_err();
        assert_eq!(err.status(), Status::OUT_OF_RESOURCES);

        let held = registry.snapshot().unwrap();
        assert_eq!(held.modifiers, AppleModifierMap::LEFT_SHIFT);
        assert_eq!(held.keys, vec![KEY_A]);
    }

    #[test]
    fn test_set_keys_shrinks_held_keys() {
        let mut registry = KeyStrokeRegistry::new();
        let index = registry.create_buffer(3).unwrap();
        registry
            .set_keys(index, AppleModifierMap::empty(), &[KEY_A, KEY_B, KEY_C])
            .unwrap();
        registry
            .set_keys(index, AppleModifierMap::empty(), &[KEY_C])
            .unwrap();

        assert_eq!(registry.snapshot().unwrap().keys, vec![KEY_C]);
    }

    #[test]
    fn test_aggregate_across_buffers() {
        let mut registry = KeyStrokeRegistry::new();
        let internal = registry.create_buffer(4).unwrap();
        let external = registry.create_buffer(4).unwrap();
        registry
            .set_keys(internal, AppleModifierMap::LEFT_COMMAND, &[KEY_A, KEY_B])
            .unwrap();
        registry
            .set_keys(external, AppleModifierMap::RIGHT_SHIFT, &[KEY_B, KEY_C])
            .unwrap();

        let held = registry.snapshot().unwrap();
        assert_eq!(
            held.modifiers,
            AppleModifierMap::LEFT_COMMAND | AppleModifierMap::RIGHT_SHIFT
        );
        assert_eq!(held.keys, vec![KEY_A, KEY_B, KEY_C]);
    }

    #[test]
    fn test_get_key_strokes_two_phase() {
        let mut registry = KeyStrokeRegistry::new();
        let index = registry.create_buffer(4).unwrap();
        registry
            .set_keys(index, AppleModifierMap::LEFT_OPTION, &[KEY_A, KEY_B])
            .unwrap();

        let err = registry.get_key_strokes(None).unwrap_err();
        assert_eq!(err.status(), Status::BUFFER_TOO_SMALL);
        let required = err.data().unwrap();
        assert_eq!(required, 2);

        let mut keys = vec![0; required];
        let (modifiers, count) = registry.get_key_strokes(Some(&mut keys)).unwrap();
        assert_eq!(modifiers, AppleModifierMap::LEFT_OPTION);
        assert_eq!(count, 2);
        assert_eq!(keys, [KEY_A, KEY_B]);
    }

    #[test]
    fn test_get_key_strokes_nothing_held() {
        let mut registry = KeyStrokeRegistry::new();
        registry.create_buffer(4).unwrap();
        assert_eq!(
            registry.get_key_strokes(None).unwrap(),
            (AppleModifierMap::empty(), 0)
        );
    }

    #[test]
    fn test_contains_key_strokes() {
        let mut registry = KeyStrokeRegistry::new();
        let index = registry.create_buffer(4).unwrap();
        registry
            .set_keys(index, AppleModifierMap::LEFT_COMMAND, &[KEY_A])
            .unwrap();

        registry
            .contains_key_strokes(AppleModifierMap::LEFT_COMMAND, &[KEY_A], true)
            .unwrap();
        registry
            .contains_key_strokes(AppleModifierMap::empty(), &[KEY_A], false)
            .unwrap();
        assert_eq!(
            registry
                .contains_key_strokes(AppleModifierMap::empty(), &[KEY_A], true)
                .unwrap_err()
                .status(),
            Status::NOT_FOUND
        );
        assert_eq!(
            registry
                .contains_key_strokes(AppleModifierMap::LEFT_COMMAND, &[KEY_B], false)
                .unwrap_err()
                .status(),
            Status::NOT_FOUND
        );
    }
}
