// SPDX-License-Identifier: MIT OR Apache-2.0

//! Apple key map database and aggregator protocols.
//!
//! HID drivers publish the keys they see into indexed key-stroke buffers of
//! the database; consumers read the union of all buffers through the
//! aggregator.

use crate::{guid, Boolean, Guid, Status};
use bitflags::bitflags;

/// An Apple key code: a HID usage page in the high byte and a usage in the
/// low byte.
pub type AppleKeyCode = u16;

/// HID usage page of keyboard keys, pre-shifted into an [`AppleKeyCode`].
pub const APPLE_HID_USAGE_KEYBOARD: AppleKeyCode = 0x7000;

/// Builds the key code of a keyboard usage.
#[must_use]
pub const fn apple_keyboard_key(usage: u8) -> AppleKeyCode {
    APPLE_HID_USAGE_KEYBOARD | usage as AppleKeyCode
}

/// Key code of the caps lock key.
pub const APPLE_KEY_CAPS_LOCK: AppleKeyCode = apple_keyboard_key(0x39);

bitflags! {
    /// Modifier keys held while a key stroke was recorded.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[repr(transparent)]
    pub struct AppleModifierMap: u16 {
        const LEFT_CONTROL = 1 << 0;
        const LEFT_SHIFT = 1 << 1;
        const LEFT_OPTION = 1 << 2;
        const LEFT_COMMAND = 1 << 3;
        const RIGHT_CONTROL = 1 << 4;
        const RIGHT_SHIFT = 1 << 5;
        const RIGHT_OPTION = 1 << 6;
        const RIGHT_COMMAND = 1 << 7;

        const CONTROL = Self::LEFT_CONTROL.bits() | Self::RIGHT_CONTROL.bits();
        const SHIFT = Self::LEFT_SHIFT.bits() | Self::RIGHT_SHIFT.bits();
        const OPTION = Self::LEFT_OPTION.bits() | Self::RIGHT_OPTION.bits();
        const COMMAND = Self::LEFT_COMMAND.bits() | Self::RIGHT_COMMAND.bits();
    }
}

#[derive(Debug)]
#[repr(C)]
pub struct AppleKeyMapDatabaseProtocol {
    pub revision: u64,
    pub create_key_strokes_buffer: unsafe extern "efiapi" fn(
        this: *mut Self,
        key_buffer_size: usize,
        index: *mut usize,
    ) -> Status,
    pub remove_key_strokes_buffer:
        unsafe extern "efiapi" fn(this: *mut Self, index: usize) -> Status,
    pub set_key_strokes_buffer_keys: unsafe extern "efiapi" fn(
        this: *mut Self,
        index: usize,
        modifiers: AppleModifierMap,
        number_of_keys: usize,
        keys: *const AppleKeyCode,
    ) -> Status,
}

impl AppleKeyMapDatabaseProtocol {
    pub const GUID: Guid = guid!("584b9ebe-80c1-4bd6-98b0-a7786ec2f2e2");
    pub const REVISION: u64 = 0x0001_0000;
}

#[derive(Debug)]
#[repr(C)]
pub struct AppleKeyMapAggregatorProtocol {
    pub revision: u64,
    pub get_key_strokes: unsafe extern "efiapi" fn(
        this: *mut Self,
        modifiers: *mut AppleModifierMap,
        number_of_key_codes: *mut usize,
        key_codes: *mut AppleKeyCode,
    ) -> Status,
    pub contains_key_strokes: unsafe extern "efiapi" fn(
        this: *mut Self,
        modifiers: AppleModifierMap,
        number_of_key_codes: usize,
        key_codes: *const AppleKeyCode,
        exact_match: Boolean,
    ) -> Status,
}

impl AppleKeyMapAggregatorProtocol {
    pub const GUID: Guid = guid!("5b213447-6e73-4901-a4f1-b864f3b7a172");
    pub const REVISION: u64 = 0x0001_0000;
}
