// SPDX-License-Identifier: MIT OR Apache-2.0

//! Block I/O protocol [`BlockIO`].

use crate::{unsafe_protocol, Result, StatusExt};

pub use apple_raw::protocol::block::{BlockIoMedia, BlockIoProtocol, Lba};

/// Block I/O [`Protocol`].
///
/// The partition driver only needs the media description of the parent
/// device; reads go through [`DiskIo`].
///
/// [`Protocol`]: crate::proto::Protocol
/// [`DiskIo`]: super::disk::DiskIo
#[derive(Debug)]
#[repr(transparent)]
pub struct BlockIO(BlockIoProtocol);

unsafe_protocol!(BlockIO, BlockIoProtocol::GUID);

impl BlockIO {
    /// Pointer for block IO media.
    #[must_use]
    pub const fn media(&self) -> &BlockIOMedia {
        unsafe { &*self.0.media.cast::<BlockIOMedia>() }
    }

    /// Read the requested number of blocks from the device.
    ///
    /// # Errors
    /// * `Status::DEVICE_ERROR`       The device reported an error while attempting to perform the read
    ///   operation.
    /// * `Status::NO_MEDIA`           There is no media in the device.
    /// * `Status::MEDIA_CHANGED`      The `media_id` is not for the current media.
    /// * `Status::BAD_BUFFER_SIZE`    The buffer size parameter is not a multiple of the intrinsic block size of
    ///   the device.
    pub fn read_blocks(&self, media_id: u32, lba: Lba, buffer: &mut [u8]) -> Result {
        let buffer_size = buffer.len();
        unsafe {
            (self.0.read_blocks)(
                &self.0,
                media_id,
                lba,
                buffer_size,
                buffer.as_mut_ptr().cast(),
            )
        }
        .to_result()
    }
}

/// Media information structure
#[repr(transparent)]
#[derive(Clone, Copy, Debug)]
pub struct BlockIOMedia(BlockIoMedia);

impl BlockIOMedia {
    /// The current media ID.
    #[must_use]
    pub const fn media_id(&self) -> u32 {
        self.0.media_id
    }

    /// True if there is a media currently present in the device.
    #[must_use]
    pub fn is_media_present(&self) -> bool {
        self.0.media_present.into()
    }

    /// True if block IO was produced to abstract partition structure.
    #[must_use]
    pub fn is_logical_partition(&self) -> bool {
        self.0.logical_partition.into()
    }

    /// The intrinsic block size of the device.
    #[must_use]
    pub const fn block_size(&self) -> u32 {
        self.0.block_size
    }

    /// The last logical block address on the device.
    #[must_use]
    pub const fn last_block(&self) -> Lba {
        self.0.last_block
    }
}

impl From<BlockIoMedia> for BlockIOMedia {
    fn from(media: BlockIoMedia) -> Self {
        Self(media)
    }
}
