// SPDX-License-Identifier: MIT OR Apache-2.0

//! Disk I/O protocol.

use crate::{unsafe_protocol, Result, StatusExt};
use apple_raw::protocol::disk::DiskIoProtocol;

/// Byte-granular read access to a disk.
///
/// This is the seam the partition parsers read through. It is implemented by
/// the firmware's [`DiskIo`] protocol and by in-memory images in tests.
pub trait DiskRead {
    /// Reads `buffer.len()` bytes starting at byte `offset` of medium
    /// `media_id`.
    ///
    /// # Errors
    ///
    /// * `Status::INVALID_PARAMETER` The read request contains device addresses that
    ///   are not valid for the device.
    /// * `Status::DEVICE_ERROR`      The device reported an error while performing
    ///   the read operation.
    /// * `Status::NO_MEDIA`          There is no medium in the device.
    /// * `Status::MEDIA_CHANGED`     `media_id` is not for the current medium.
    fn read_disk(&self, media_id: u32, offset: u64, buffer: &mut [u8]) -> Result;
}

/// The disk I/O protocol.
///
/// This protocol is used to abstract the block accesses of the block I/O
/// protocol to a more general offset-length protocol. Firmware is
/// responsible for adding this protocol to any block I/O interface that
/// appears in the system that does not already have a disk I/O protocol.
#[derive(Debug)]
#[repr(transparent)]
pub struct DiskIo(DiskIoProtocol);

unsafe_protocol!(DiskIo, DiskIoProtocol::GUID);

impl DiskRead for DiskIo {
    fn read_disk(&self, media_id: u32, offset: u64, buffer: &mut [u8]) -> Result {
        unsafe {
            (self.0.read_disk)(
                &self.0,
                media_id,
                offset,
                buffer.len(),
                buffer.as_mut_ptr().cast(),
            )
        }
        .to_result()
    }
}
