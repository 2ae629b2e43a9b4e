// SPDX-License-Identifier: MIT OR Apache-2.0

//! Apple boot-time platform services, written as UEFI driver libraries.
//!
//! # Crate organisation
//!
//! The top-level module contains the most used types, such as the result
//! and error types, GUIDs and handles.
//!
//! ## Drivers
//!
//! The `proto` module contains one driver per Apple service:
//!
//! - [`proto::media::partition`] parses the Apple Partition Map of a disk
//!   and installs one child handle per usable partition.
//! - [`proto::key_map`] keeps the key strokes reported by every keyboard
//!   driver and publishes the key map database and aggregator protocols.
//! - [`proto::apple_event`] lets consumers register handlers for keyboard
//!   and pointer events and polls the input devices while handlers exist.
//!
//! It also contains the console and media protocols these drivers consume.
//!
//! ## Host services
//!
//! The drivers never call boot services directly. The [`boot`] module
//! declares the protocol database and timer traits the host implements.
//!
//! ## Optional crate features
//!
//! - `logger`: Logging implementation for the standard [`log`] crate
//!   that prints output to the UEFI console. No buffering is done; this
//!   is not a high-performance logger.

#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![no_std]
// Enable some additional warnings and lints.
#![warn(clippy::ptr_as_ptr, missing_docs, unused)]
#![deny(clippy::all)]

extern crate alloc;

// allow referring to self as ::apple_efi for macros to work universally (from
// this crate and from others)
// see https://github.com/rust-lang/rust/issues/54647
extern crate self as apple_efi;

pub mod data_types;
pub use data_types::{Guid, Handle, Identify};

pub use apple_raw::guid;

mod result;
pub use result::{Error, Result, ResultExt, Status, StatusExt};

pub mod boot;
pub mod helpers;
pub mod prelude;
pub mod proto;
