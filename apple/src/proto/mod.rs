// SPDX-License-Identifier: MIT OR Apache-2.0

//! Protocol definitions.
//!
//! Protocols are sets of related functionality identified by a unique
//! ID. The drivers in this crate consume the console and media protocols
//! published by the firmware and produce the Apple protocols in
//! [`key_map`] and [`apple_event`].

pub mod apple_event;
pub mod console;
pub mod key_map;
pub mod media;

use crate::Identify;

/// Common trait implemented by all protocols.
///
/// You can implement the `Protocol` trait and specify the protocol's GUID
/// using the [`unsafe_protocol`] macro.
///
/// # Example
///
/// ```
/// use apple_efi::{Identify, guid, unsafe_protocol};
///
/// struct ExampleProtocol {}
/// unsafe_protocol!(ExampleProtocol, guid!("12345678-9abc-def0-1234-56789abcdef0"));
///
/// assert_eq!(ExampleProtocol::GUID, guid!("12345678-9abc-def0-1234-56789abcdef0"));
/// ```
///
/// [`unsafe_protocol`]: crate::unsafe_protocol
pub trait Protocol: Identify {}

/// Implements [`Identify`] and [`Protocol`] for a type.
///
/// # Safety
///
/// The caller must ensure that the correct GUID is attached to the
/// type. An incorrect GUID could lead to invalid casts and other
/// unsound behavior.
#[macro_export]
macro_rules! unsafe_protocol {
    ($type:ty, $guid:expr) => {
        unsafe impl $crate::Identify for $type {
            const GUID: $crate::Guid = $guid;
        }

        impl $crate::proto::Protocol for $type {}
    };
}
