// SPDX-License-Identifier: MIT OR Apache-2.0

//! Protocol definitions.
//!
//! Protocols are sets of related functionality identified by a unique
//! ID. The UEFI ones here are consumed by the Apple drivers; the Apple ones
//! are produced by them.

pub mod apple_event;
pub mod block;
pub mod console;
pub mod disk;
pub mod key_map;
