// SPDX-License-Identifier: MIT OR Apache-2.0

//! Raw interface for Apple's boot-time firmware services.
//!
//! This crate holds the bit-exact definitions shared between the firmware
//! drivers and their consumers: the on-disk Apple Partition Map layout, the
//! UEFI protocol tables the drivers consume (block and disk I/O, pointer,
//! text output) and the Apple protocol tables they produce (key map database,
//! key map aggregator, Apple Event).
//!
//! For implementing or consuming the services, use the [`apple-efi`] crate
//! instead, which provides the safe layer on top of these types.
//!
//! [`apple-efi`]: https://crates.io/crates/apple-efi

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![deny(
    clippy::all,
    clippy::must_use_candidate,
    clippy::ptr_as_ptr,
    clippy::use_self,
    missing_debug_implementations,
    unused
)]

#[macro_use]
mod enums;

pub mod apm;
pub mod device_path;
pub mod protocol;

mod status;

pub use status::Status;
pub use uguid::{guid, Guid};

use core::ffi::c_void;

/// Handle to an event structure.
pub type Event = *mut c_void;

/// Handle to a UEFI entity (protocol, image, etc).
pub type Handle = *mut c_void;

/// One-byte character.
///
/// Apple protocols use these for event names and partition type strings.
/// Unless otherwise noted, they are encoded as 8-bit ASCII.
pub type Char8 = u8;

/// Two-byte character, UCS-2 encoded.
pub type Char16 = u16;

/// ABI-compatible UEFI boolean.
///
/// This is similar to a `bool`, but allows values other than 0 or 1 to be
/// stored without it being undefined behavior.
///
/// Any non-zero value is treated as logically `true`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Ord, PartialOrd, Eq, Hash)]
#[repr(transparent)]
pub struct Boolean(pub u8);

impl Boolean {
    /// [`Boolean`] representing `true`.
    pub const TRUE: Self = Self(1);

    /// [`Boolean`] representing `false`.
    pub const FALSE: Self = Self(0);
}

impl From<bool> for Boolean {
    fn from(value: bool) -> Self {
        match value {
            true => Self(1),
            false => Self(0),
        }
    }
}

impl From<Boolean> for bool {
    #[allow(clippy::match_like_matches_macro)]
    fn from(value: Boolean) -> Self {
        // We handle it as in C: Any bit-pattern != 0 equals true
        match value.0 {
            0 => false,
            _ => true,
        }
    }
}

/// A two-dimensional point or extent, used for the cursor position and the
/// screen resolution reported to Apple Event handlers.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
#[repr(C)]
pub struct Dimension {
    pub horizontal: i32,
    pub vertical: i32,
}

impl Dimension {
    /// Creates a new point.
    #[must_use]
    pub const fn new(horizontal: i32, vertical: i32) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }
}
