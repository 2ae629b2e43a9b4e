// SPDX-License-Identifier: MIT OR Apache-2.0

//! Partition table parsing.
//!
//! A partition driver inspects the first blocks of a disk, and for every
//! partition it recognizes asks the firmware to create a child handle
//! carrying block I/O for that range. Creating the handle is the job of a
//! [`ChildHandleInstaller`]; this module only decides what to install.

mod apple;

pub use apple::{
    install_apple_child_handles, ApmPartition, ApplePartitionMap, Partitions, APM_MIN_BLOCK_SIZE,
};

/// Creates partition child handles on behalf of a partition parser.
///
/// In firmware this wraps the partition driver's child-handle routine, which
/// installs the device path, block I/O and partition info protocols on a new
/// handle.
pub trait ChildHandleInstaller {
    /// Installs a child handle for `partition`.
    ///
    /// # Errors
    ///
    /// Any status reported by the firmware. A failure only affects this
    /// partition; parsing continues with the next entry.
    fn install_child_handle(&mut self, partition: &ApmPartition) -> crate::Result;
}
