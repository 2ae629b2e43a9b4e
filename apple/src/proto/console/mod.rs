// SPDX-License-Identifier: MIT OR Apache-2.0

//! Console support protocols.
//!
//! The Apple Event driver samples a [`pointer::Pointer`] device, and the
//! optional logger writes to a [`text::Output`] console.

pub mod pointer;
pub mod text;
