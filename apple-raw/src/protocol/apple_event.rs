// SPDX-License-Identifier: MIT OR Apache-2.0

//! Apple Event protocol.
//!
//! Consumers register notification functions for classes of keyboard and
//! pointer events; the driver samples the input devices on recurring timers
//! and calls every matching handler.

use crate::protocol::key_map::{AppleKeyCode, AppleModifierMap};
use crate::{guid, Boolean, Char8, Dimension, Guid, Status};
use bitflags::bitflags;
use core::ffi::c_void;
use core::fmt::{self, Debug, Formatter};

bitflags! {
    /// Classes of events a handler can subscribe to. A query carries the
    /// bits describing what happened; a handler is notified when its own
    /// bits intersect them.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
    #[repr(transparent)]
    pub struct AppleEventType: u32 {
        const MOUSE_MOVED = 1 << 0;
        const MOUSE_DOWN = 1 << 1;
        const MOUSE_UP = 1 << 2;
        const MOUSE_CLICK = 1 << 3;
        const MOUSE_DOUBLE_CLICK = 1 << 4;
        const LEFT_BUTTON = 1 << 5;
        const RIGHT_BUTTON = 1 << 6;

        const KEY_DOWN = 1 << 8;
        const KEY_UP = 1 << 9;
        const MODIFIER_DOWN = 1 << 10;
        const MODIFIER_UP = 1 << 11;

        const ALL_MOUSE_EVENTS = 0x0000_00ff;
        const ALL_KEYBOARD_EVENTS = 0x0000_ff00;
    }
}

/// Opaque handle returned by `register_handler`.
pub type AppleEventHandle = *mut c_void;

/// Value of [`AppleEventHandle`] that addresses every registered handler in
/// `unregister_handler`.
pub const APPLE_EVENT_HANDLE_ALL: AppleEventHandle = usize::MAX as AppleEventHandle;

/// Key payload of a keyboard event.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[repr(C)]
pub struct AppleKeyEventData {
    pub number_of_key_pairs: usize,
    pub apple_key: AppleKeyCode,
    pub modifiers: AppleModifierMap,
}

/// Event-specific payload of an [`AppleEventInformation`].
#[derive(Clone, Copy)]
#[repr(C)]
pub union AppleEventData {
    pub raw: *mut c_void,
    pub key_data: *mut AppleKeyEventData,
    pub pointer_event_type: AppleEventType,
}

impl Debug for AppleEventData {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        // Which member is live depends on the event type of the enclosing
        // query, so only the pointer-sized view is printed.
        f.debug_struct("AppleEventData")
            .field("raw", unsafe { &self.raw })
            .finish()
    }
}

/// A query passed to handler notification functions.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct AppleEventInformation {
    pub event_type: AppleEventType,
    pub event_data: AppleEventData,
    pub number_of_key_pairs: usize,
    pub pointer_position: Dimension,
    pub creation_timestamp: u64,
    pub modifiers: AppleModifierMap,
}

/// Handler notification function.
pub type AppleEventNotifyFunction =
    unsafe extern "efiapi" fn(information: *mut AppleEventInformation, notify_context: *mut c_void);

#[derive(Debug)]
#[repr(C)]
pub struct AppleEventProtocol {
    pub revision: u32,
    pub register_handler: unsafe extern "efiapi" fn(
        event_type: AppleEventType,
        notify_function: Option<AppleEventNotifyFunction>,
        handle: *mut AppleEventHandle,
        notify_context: *mut c_void,
    ) -> Status,
    pub unregister_handler: unsafe extern "efiapi" fn(handle: AppleEventHandle) -> Status,
    pub set_cursor_position: unsafe extern "efiapi" fn(position: *const Dimension) -> Status,
    pub set_event_name:
        unsafe extern "efiapi" fn(handle: AppleEventHandle, name: *const Char8) -> Status,
    pub is_caps_lock_active: unsafe extern "efiapi" fn(active: *mut Boolean) -> Status,
}

impl AppleEventProtocol {
    pub const GUID: Guid = guid!("33be0ef1-89c9-4a6d-bb9f-69dc8dd516b9");
    pub const REVISION: u32 = 0x0000_0007;
}
