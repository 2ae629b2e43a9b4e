// SPDX-License-Identifier: MIT OR Apache-2.0

//! Optional helpers integrating the drivers with the Rust ecosystem.
//!
//! For now, this includes an implementation of [`Log`] writing to a
//! firmware console (feature `logger`).
//!
//! [`Log`]: log::Log

#[cfg(feature = "logger")]
pub mod logger;
