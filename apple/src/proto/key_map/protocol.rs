// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{AppleKeyCode, AppleModifierMap, KeyStrokeSource, KeyStrokes};
use crate::{unsafe_protocol, Error, Result, Status, StatusExt};
use alloc::vec::Vec;
use apple_raw::protocol::key_map::{AppleKeyMapAggregatorProtocol, AppleKeyMapDatabaseProtocol};
use core::ptr;

/// Apple key map database [`Protocol`], used by keyboard drivers to publish
/// the keys held on their device.
///
/// [`Protocol`]: crate::proto::Protocol
#[derive(Debug)]
#[repr(transparent)]
pub struct KeyMapDatabase(AppleKeyMapDatabaseProtocol);

unsafe_protocol!(KeyMapDatabase, AppleKeyMapDatabaseProtocol::GUID);

impl KeyMapDatabase {
    /// Creates a key strokes buffer for up to `capacity` keys and returns its
    /// index.
    ///
    /// # Errors
    ///
    /// * `Status::OUT_OF_RESOURCES` The buffer could not be allocated.
    pub fn create_key_strokes_buffer(&mut self, capacity: usize) -> Result<usize> {
        let mut index = 0;
        unsafe { (self.0.create_key_strokes_buffer)(&mut self.0, capacity, &mut index) }
            .to_result_with_val(|| index)
    }

    /// Removes the key strokes buffer at `index`.
    ///
    /// # Errors
    ///
    /// * `Status::NOT_FOUND` No buffer has this index.
    pub fn remove_key_strokes_buffer(&mut self, index: usize) -> Result {
        unsafe { (self.0.remove_key_strokes_buffer)(&mut self.0, index) }.to_result()
    }

    /// Replaces the modifiers and keys stored at `index`.
    ///
    /// # Errors
    ///
    /// * `Status::NOT_FOUND` No buffer has this index.
    /// * `Status::OUT_OF_RESOURCES` `keys` exceeds the buffer's capacity.
    pub fn set_key_strokes_buffer_keys(
        &mut self,
        index: usize,
        modifiers: AppleModifierMap,
        keys: &[AppleKeyCode],
    ) -> Result {
        unsafe {
            (self.0.set_key_strokes_buffer_keys)(
                &mut self.0,
                index,
                modifiers,
                keys.len(),
                keys.as_ptr(),
            )
        }
        .to_result()
    }
}

/// Apple key map aggregator [`Protocol`], the read side of the key map
/// database.
///
/// [`Protocol`]: crate::proto::Protocol
#[derive(Debug)]
#[repr(transparent)]
pub struct KeyMapAggregator(AppleKeyMapAggregatorProtocol);

unsafe_protocol!(KeyMapAggregator, AppleKeyMapAggregatorProtocol::GUID);

impl KeyMapAggregator {
    /// Copies the keys held on all keyboards into `key_codes` and returns
    /// the held modifiers and the number of keys written.
    ///
    /// # Errors
    ///
    /// * `Status::BUFFER_TOO_SMALL` `key_codes` is too small. The error data
    ///   is the required number of key codes.
    pub fn get_key_strokes(
        &mut self,
        key_codes: Option<&mut [AppleKeyCode]>,
    ) -> Result<(AppleModifierMap, usize), Option<usize>> {
        let (key_codes, mut count) = match key_codes {
            Some(key_codes) => (key_codes.as_mut_ptr(), key_codes.len()),
            None => (ptr::null_mut(), 0),
        };
        let mut modifiers = AppleModifierMap::empty();

        let status =
            unsafe { (self.0.get_key_strokes)(&mut self.0, &mut modifiers, &mut count, key_codes) };
        match status {
            Status::SUCCESS => Ok((modifiers, count)),
            Status::BUFFER_TOO_SMALL => Err(Error::new(status, Some(count))),
            _ => Err(Error::new(status, None)),
        }
    }

    /// Checks whether a key combination is currently held.
    ///
    /// With `exact_match` the held modifiers must equal `modifiers` and no
    /// other key may be held. Otherwise `modifiers` only has to be a subset
    /// of the held modifiers.
    ///
    /// # Errors
    ///
    /// * `Status::NOT_FOUND` The combination is not held.
    pub fn contains_key_strokes(
        &mut self,
        modifiers: AppleModifierMap,
        keys: &[AppleKeyCode],
        exact_match: bool,
    ) -> Result {
        unsafe {
            (self.0.contains_key_strokes)(
                &mut self.0,
                modifiers,
                keys.len(),
                keys.as_ptr(),
                exact_match.into(),
            )
        }
        .to_result()
    }
}

impl KeyStrokeSource for KeyMapAggregator {
    fn key_strokes(&mut self) -> Result<KeyStrokes> {
        let mut keys = Vec::new();
        loop {
            match self.get_key_strokes(Some(keys.as_mut_slice())) {
                Ok((modifiers, count)) => {
                    keys.truncate(count);
                    return Ok(KeyStrokes { modifiers, keys });
                }
                Err(err) if err.status() == Status::BUFFER_TOO_SMALL => {
                    let required = err.data().unwrap_or(0);
                    if required <= keys.len() {
                        return Err(err.to_err_without_payload());
                    }
                    keys.try_reserve_exact(required - keys.len())
                        .map_err(|_| Status::OUT_OF_RESOURCES)?;
                    keys.resize(required, 0);
                }
                Err(err) => return Err(err.to_err_without_payload()),
            }
        }
    }
}
