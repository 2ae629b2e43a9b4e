// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media access protocols.
//!
//! These protocols can be used to enumerate and access the partitions of a
//! disk device.

pub mod block;
pub mod disk;
pub mod partition;
