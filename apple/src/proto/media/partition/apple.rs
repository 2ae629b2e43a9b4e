// SPDX-License-Identifier: MIT OR Apache-2.0

//! Apple Partition Map.
//!
//! The map starts with a driver descriptor in the first physical block of
//! the device. It declares the APM block size, and partition entries follow
//! one per APM block starting at APM block 1. The first entry describes the
//! map itself and carries the total number of entries.

use super::ChildHandleInstaller;
use crate::proto::media::block::{BlockIOMedia, Lba};
use crate::proto::media::disk::DiskRead;
use crate::{Result, Status};
use alloc::vec::Vec;
use apple_raw::apm::{ApmDriverDescriptor, ApmEntry, APM_STRING_LENGTH};
use apple_raw::device_path::{
    DevicePathHeader, DeviceType, HardDriveMediaDevicePath, MediaSubType, PartitionFormat,
    SignatureType,
};
use core::fmt::{self, Debug, Formatter};
use log::{debug, info, warn};

/// Smallest APM block size that can hold a partition entry.
pub const APM_MIN_BLOCK_SIZE: usize = size_of::<ApmEntry>();

/// Allocates a zeroed scratch buffer, reporting allocation failure instead
/// of aborting.
fn scratch_buffer(len: usize) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| Status::OUT_OF_RESOURCES)?;
    buffer.resize(len, 0);
    Ok(buffer)
}

/// Compares a fixed-length, NUL-padded on-disk string with `expected`.
fn string_field_eq(field: &[u8; APM_STRING_LENGTH], expected: &[u8]) -> bool {
    string_field(field) == expected
}

/// The bytes of a fixed-length on-disk string up to its NUL terminator.
fn string_field(field: &[u8; APM_STRING_LENGTH]) -> &[u8] {
    let len = field
        .iter()
        .position(|&c| c == 0)
        .unwrap_or(APM_STRING_LENGTH);
    &field[..len]
}

/// A validated Apple Partition Map on a disk.
///
/// Opening the map checks the driver descriptor and the entry describing the
/// map itself. The partition entries are read lazily by [`partitions`].
///
/// [`partitions`]: Self::partitions
pub struct ApplePartitionMap<'a, D: DiskRead + ?Sized> {
    disk: &'a D,
    media_id: u32,
    device_block_size: u32,
    last_block: Lba,
    block_size: u16,
    entry_count: u32,
    entry_buffer: Vec<u8>,
}

impl<'a, D: DiskRead + ?Sized> ApplePartitionMap<'a, D> {
    /// Reads and validates the map headers of `disk`.
    ///
    /// # Errors
    ///
    /// * `Status::NOT_FOUND` The disk does not carry an Apple Partition Map:
    ///   the driver descriptor or map entry signature is wrong, the map entry
    ///   is not of type `Apple_partition_map`, the APM block size cannot hold
    ///   an entry, or fewer than two entries are declared.
    /// * `Status::OUT_OF_RESOURCES` A scratch buffer could not be allocated.
    /// * Any error reported by the disk while reading the headers.
    pub fn open(disk: &'a D, media: &BlockIOMedia) -> Result<Self> {
        let media_id = media.media_id();
        let device_block_size = media.block_size();

        if (device_block_size as usize) < size_of::<ApmDriverDescriptor>() {
            debug!("block size {device_block_size} cannot hold an APM driver descriptor");
            return Err(Status::NOT_FOUND.into());
        }

        let block_size = {
            let mut header = scratch_buffer(device_block_size as usize)?;
            disk.read_disk(media_id, 0, &mut header)?;

            // SAFETY: the buffer holds at least one driver descriptor, which
            // has an alignment of one.
            let descriptor =
                unsafe { header.as_ptr().cast::<ApmDriverDescriptor>().read_unaligned() };
            if descriptor.signature.get() != ApmDriverDescriptor::SIGNATURE {
                return Err(Status::NOT_FOUND.into());
            }
            descriptor.block_size.get()
        };

        if usize::from(block_size) < APM_MIN_BLOCK_SIZE {
            debug!("APM block size {block_size} is too small for a partition entry");
            return Err(Status::NOT_FOUND.into());
        }

        let mut map = Self {
            disk,
            media_id,
            device_block_size,
            last_block: media.last_block(),
            block_size,
            entry_count: 0,
            entry_buffer: scratch_buffer(usize::from(block_size))?,
        };

        let map_entry = map.read_entry(0)?;
        if map_entry.signature.get() != ApmEntry::SIGNATURE
            || !string_field_eq(&map_entry.partition_type, ApmEntry::TYPE_PARTITION_MAP)
        {
            debug!("first APM entry does not describe the partition map");
            return Err(Status::NOT_FOUND.into());
        }

        map.entry_count = map_entry.map_entry_count.get();
        if map.entry_count < 2 {
            debug!("APM declares {} entries, no partitions", map.entry_count);
            return Err(Status::NOT_FOUND.into());
        }

        Ok(map)
    }

    /// The APM block size in bytes.
    #[must_use]
    pub const fn block_size(&self) -> u16 {
        self.block_size
    }

    /// Number of entries declared by the map, including the map's own entry.
    #[must_use]
    pub const fn entry_count(&self) -> u32 {
        self.entry_count
    }

    /// Iterates the partition entries that describe usable partitions.
    ///
    /// Free space, empty entries, entries whose range does not convert
    /// exactly to device blocks, and entries extending past the end of the
    /// device are skipped. A read failure or a bad entry signature means the
    /// map is corrupt: the iterator yields the error once and then ends.
    pub fn partitions(&mut self) -> Partitions<'_, 'a, D> {
        Partitions {
            map: self,
            index: 1,
            done: false,
        }
    }

    /// Reads entry `index`, located in APM block `index + 1`.
    fn read_entry(&mut self, index: u32) -> Result<ApmEntry> {
        let offset = (u64::from(index) + 1) * u64::from(self.block_size);
        self.disk
            .read_disk(self.media_id, offset, &mut self.entry_buffer)?;

        // SAFETY: the buffer is one APM block, which is at least as large as
        // an entry, and entries have an alignment of one.
        Ok(unsafe {
            self.entry_buffer
                .as_ptr()
                .cast::<ApmEntry>()
                .read_unaligned()
        })
    }

    /// Converts a count of APM blocks into device blocks, if it maps to a
    /// whole number of them.
    fn to_device_blocks(&self, apm_blocks: u32) -> Option<Lba> {
        let bytes = u64::from(apm_blocks) * u64::from(self.block_size);
        let device_block_size = u64::from(self.device_block_size);
        if bytes % device_block_size != 0 {
            return None;
        }
        Some(bytes / device_block_size)
    }

    /// Turns a raw entry into a partition, or `None` if the entry is to be
    /// skipped.
    fn validate(&self, index: u32, entry: &ApmEntry) -> Option<ApmPartition> {
        let apm_start = entry.partition_start.get();
        let apm_size = entry.partition_size.get();

        if string_field_eq(&entry.partition_type, ApmEntry::TYPE_FREE) || apm_size == 0 {
            debug!("APM entry {index}: free or empty");
            return None;
        }

        let (Some(starting_lba), Some(size)) = (
            self.to_device_blocks(apm_start),
            self.to_device_blocks(apm_size),
        ) else {
            let device_block_size = self.device_block_size;
            debug!("APM entry {index}: {apm_start}+{apm_size} misaligned to {device_block_size}");
            return None;
        };

        let ending_lba = match starting_lba.checked_add(size - 1) {
            Some(lba) if lba <= self.last_block => lba,
            _ => {
                debug!("APM entry {index}: ends beyond last block {}", self.last_block);
                return None;
            }
        };

        Some(ApmPartition {
            index,
            name: entry.name,
            partition_type: entry.partition_type,
            starting_lba,
            ending_lba,
            block_size: self.device_block_size,
        })
    }
}

impl<D: DiskRead + ?Sized> Debug for ApplePartitionMap<'_, D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplePartitionMap")
            .field("media_id", &self.media_id)
            .field("device_block_size", &self.device_block_size)
            .field("last_block", &self.last_block)
            .field("block_size", &self.block_size)
            .field("entry_count", &self.entry_count)
            .finish_non_exhaustive()
    }
}

/// Iterator over the usable partitions of an [`ApplePartitionMap`].
#[derive(Debug)]
pub struct Partitions<'m, 'a, D: DiskRead + ?Sized> {
    map: &'m mut ApplePartitionMap<'a, D>,
    index: u32,
    done: bool,
}

impl<D: DiskRead + ?Sized> Iterator for Partitions<'_, '_, D> {
    type Item = Result<ApmPartition>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done && self.index < self.map.entry_count {
            let index = self.index;
            self.index += 1;

            let entry = match self.map.read_entry(index) {
                Ok(entry) => entry,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            };

            if entry.signature.get() != ApmEntry::SIGNATURE {
                self.done = true;
                return Some(Err(Status::VOLUME_CORRUPTED.into()));
            }

            if let Some(partition) = self.map.validate(index, &entry) {
                return Some(Ok(partition));
            }
        }
        None
    }
}

impl<D: DiskRead + ?Sized> core::iter::FusedIterator for Partitions<'_, '_, D> {}

/// A usable partition described by an Apple Partition Map entry, with its
/// range already converted to device blocks.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ApmPartition {
    index: u32,
    name: [u8; APM_STRING_LENGTH],
    partition_type: [u8; APM_STRING_LENGTH],
    starting_lba: Lba,
    ending_lba: Lba,
    block_size: u32,
}

impl ApmPartition {
    /// Index of the entry in the map. Entry 0 is the map itself.
    #[must_use]
    pub const fn entry_index(&self) -> u32 {
        self.index
    }

    /// One-based partition number reported in the device path.
    #[must_use]
    pub const fn partition_number(&self) -> u32 {
        self.index + 1
    }

    /// First device block of the partition.
    #[must_use]
    pub const fn starting_lba(&self) -> Lba {
        self.starting_lba
    }

    /// Last device block of the partition (inclusive).
    #[must_use]
    pub const fn ending_lba(&self) -> Lba {
        self.ending_lba
    }

    /// Number of device blocks in the partition.
    #[must_use]
    pub const fn size_in_blocks(&self) -> u64 {
        self.ending_lba - self.starting_lba + 1
    }

    /// Block size of the underlying device in bytes.
    #[must_use]
    pub const fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Partition name, without NUL padding.
    #[must_use]
    pub fn name(&self) -> &[u8] {
        string_field(&self.name)
    }

    /// Partition type, without NUL padding.
    #[must_use]
    pub fn type_name(&self) -> &[u8] {
        string_field(&self.partition_type)
    }

    /// The partition type field exactly as stored on disk.
    #[must_use]
    pub const fn raw_partition_type(&self) -> &[u8; APM_STRING_LENGTH] {
        &self.partition_type
    }

    /// Builds the hard drive media node identifying this partition in the
    /// child handle's device path.
    #[must_use]
    pub const fn hard_drive_node(&self) -> HardDriveMediaDevicePath {
        HardDriveMediaDevicePath {
            header: DevicePathHeader {
                device_type: DeviceType::MEDIA,
                sub_type: MediaSubType::HARD_DRIVE,
                length: HardDriveMediaDevicePath::LENGTH.to_le_bytes(),
            },
            partition_number: self.partition_number(),
            partition_start: self.starting_lba,
            partition_size: self.size_in_blocks(),
            partition_signature: [0; 16],
            partition_format: PartitionFormat::APPLE,
            signature_type: SignatureType::NONE,
        }
    }
}

impl Debug for ApmPartition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApmPartition")
            .field("partition_number", &self.partition_number())
            .field("name", &core::str::from_utf8(self.name()))
            .field("type", &core::str::from_utf8(self.type_name()))
            .field("starting_lba", &self.starting_lba)
            .field("ending_lba", &self.ending_lba)
            .field("block_size", &self.block_size)
            .finish()
    }
}

/// Installs a child handle for every usable partition of the Apple
/// Partition Map on `disk`.
///
/// Entries that cannot be used are skipped; a corrupt entry stops the scan
/// but keeps the children installed before it. The map counts as valid if
/// at least one child was installed.
///
/// # Errors
///
/// * `Status::NOT_FOUND` The disk carries no Apple Partition Map, or no
///   child could be installed from it.
/// * `Status::OUT_OF_RESOURCES` A scratch buffer could not be allocated.
/// * Any error reported by the disk while reading the map headers.
pub fn install_apple_child_handles<D, I>(
    disk: &D,
    media: &BlockIOMedia,
    installer: &mut I,
) -> Result
where
    D: DiskRead + ?Sized,
    I: ChildHandleInstaller + ?Sized,
{
    let mut map = ApplePartitionMap::open(disk, media)?;
    debug!("{map:?}");

    let mut apm_valid = false;
    for partition in map.partitions() {
        let partition = match partition {
            Ok(partition) => partition,
            Err(err) => {
                warn!("Apple Partition Map scan aborted: {}", err.status());
                break;
            }
        };

        match installer.install_child_handle(&partition) {
            Ok(()) => {
                info!("installed {partition:?}");
                apm_valid = true;
            }
            Err(err) => warn!(
                "failed to install APM partition {}: {}",
                partition.partition_number(),
                err.status()
            ),
        }
    }

    if apm_valid {
        Ok(())
    } else {
        Err(Status::NOT_FOUND.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use apple_raw::apm::{Be16, Be32};
    use apple_raw::protocol::block::BlockIoMedia;
    use apple_raw::Boolean;
    use core::cell::Cell;

    struct MemDisk {
        image: Vec<u8>,
        reads: Cell<usize>,
        fail_at: Option<u64>,
    }

    impl MemDisk {
        fn new(image: Vec<u8>) -> Self {
            Self {
                image,
                reads: Cell::new(0),
                fail_at: None,
            }
        }
    }

    impl DiskRead for MemDisk {
        fn read_disk(&self, _media_id: u32, offset: u64, buffer: &mut [u8]) -> Result {
            self.reads.set(self.reads.get() + 1);
            if self.fail_at == Some(offset) {
                return Err(Status::DEVICE_ERROR.into());
            }
            let start = offset as usize;
            let end = start + buffer.len();
            if end > self.image.len() {
                return Err(Status::INVALID_PARAMETER.into());
            }
            buffer.copy_from_slice(&self.image[start..end]);
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingInstaller {
        installed: Vec<u32>,
    }

    impl ChildHandleInstaller for CountingInstaller {
        fn install_child_handle(&mut self, partition: &ApmPartition) -> Result {
            self.installed.push(partition.partition_number());
            Ok(())
        }
    }

    fn media(block_size: u32, last_block: Lba) -> BlockIOMedia {
        BlockIoMedia {
            media_id: 1,
            media_present: Boolean::TRUE,
            block_size,
            last_block,
            ..Default::default()
        }
        .into()
    }

    fn put_entry(image: &mut [u8], offset: usize, ty: &[u8], start: u32, size: u32, count: u32) {
        let raw = &mut image[offset..offset + APM_MIN_BLOCK_SIZE];
        raw[0..2].copy_from_slice(&Be16::new(ApmEntry::SIGNATURE).0);
        raw[4..8].copy_from_slice(&Be32::new(count).0);
        raw[8..12].copy_from_slice(&Be32::new(start).0);
        raw[12..16].copy_from_slice(&Be32::new(size).0);
        raw[48..48 + ty.len()].copy_from_slice(ty);
    }

    /// Builds an image with the given APM block size and partition entries
    /// (type, start, size), preceded by the map entry.
    fn image(block_size: u16, total_len: usize, entries: &[(&[u8], u32, u32)]) -> Vec<u8> {
        let bs = usize::from(block_size);
        let mut image = vec![0u8; total_len];
        image[0..2].copy_from_slice(&Be16::new(ApmDriverDescriptor::SIGNATURE).0);
        image[2..4].copy_from_slice(&Be16::new(block_size).0);

        let count = entries.len() as u32 + 1;
        put_entry(&mut image, bs, ApmEntry::TYPE_PARTITION_MAP, 1, count, count);
        for (i, (ty, start, size)) in entries.iter().enumerate() {
            put_entry(&mut image, bs * (i + 2), ty, *start, *size, count);
        }
        image
    }

    #[test]
    fn test_not_apple_partition_map() {
        let disk = MemDisk::new(vec![0u8; 4096]);
        let err = ApplePartitionMap::open(&disk, &media(512, 7)).unwrap_err();
        assert_eq!(err.status(), Status::NOT_FOUND);
    }

    #[test]
    fn test_map_entry_must_describe_map() {
        let mut raw = image(512, 8192, &[(b"Apple_HFS", 64, 8)]);
        raw[512 + 48..512 + 48 + 19].copy_from_slice(b"Apple_Free\0\0\0\0\0\0\0\0\0");
        let disk = MemDisk::new(raw);
        let err = ApplePartitionMap::open(&disk, &media(512, 15)).unwrap_err();
        assert_eq!(err.status(), Status::NOT_FOUND);
    }

    #[test]
    fn test_too_few_entries() {
        let disk = MemDisk::new(image(512, 4096, &[]));
        let err = ApplePartitionMap::open(&disk, &media(512, 7)).unwrap_err();
        assert_eq!(err.status(), Status::NOT_FOUND);
    }

    #[test]
    fn test_block_size_too_small() {
        let mut raw = image(512, 4096, &[(b"Apple_HFS", 4, 2)]);
        raw[2..4].copy_from_slice(&Be16::new(256).0);
        let disk = MemDisk::new(raw);
        let err = ApplePartitionMap::open(&disk, &media(512, 7)).unwrap_err();
        assert_eq!(err.status(), Status::NOT_FOUND);
    }

    #[test]
    fn test_header_read_error_propagates() {
        let mut disk = MemDisk::new(image(512, 4096, &[(b"Apple_HFS", 4, 2)]));
        disk.fail_at = Some(0);
        let err = ApplePartitionMap::open(&disk, &media(512, 7)).unwrap_err();
        assert_eq!(err.status(), Status::DEVICE_ERROR);
    }

    #[test]
    fn test_same_block_size_geometry() {
        let disk = MemDisk::new(image(512, 8192, &[(b"Apple_HFS", 2048, 4096)]));
        let mut map = ApplePartitionMap::open(&disk, &media(512, 10_000)).unwrap();
        assert_eq!(map.entry_count(), 2);

        let partitions: Vec<_> = map.partitions().collect::<Result<_>>().unwrap();
        assert_eq!(partitions.len(), 1);
        let p = &partitions[0];
        assert_eq!(p.partition_number(), 2);
        assert_eq!(p.starting_lba(), 2048);
        assert_eq!(p.ending_lba(), 6143);
        assert_eq!(p.size_in_blocks(), 4096);
        assert_eq!(p.type_name(), b"Apple_HFS");
    }

    #[test]
    fn test_larger_apm_block_size() {
        let disk = MemDisk::new(image(2048, 16384, &[(b"Apple_HFS", 1, 2)]));
        let mut map = ApplePartitionMap::open(&disk, &media(512, 100)).unwrap();
        let p = map.partitions().next().unwrap().unwrap();
        assert_eq!(p.starting_lba(), 4);
        assert_eq!(p.ending_lba(), 11);
    }

    #[test]
    fn test_misaligned_entry_skipped() {
        // 512-byte APM blocks on a 2048-byte device: odd starts are not
        // representable, the aligned entry after it still counts.
        let disk = MemDisk::new(image(
            512,
            4096,
            &[(b"Apple_HFS", 3, 4), (b"Apple_HFS", 8, 4)],
        ));
        let mut map = ApplePartitionMap::open(&disk, &media(2048, 100)).unwrap();
        let partitions: Vec<_> = map.partitions().collect::<Result<_>>().unwrap();
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].entry_index(), 2);
        assert_eq!(partitions[0].starting_lba(), 2);
        assert_eq!(partitions[0].ending_lba(), 2);
    }

    #[test]
    fn test_free_empty_and_out_of_range_skipped() {
        let disk = MemDisk::new(image(
            512,
            8192,
            &[
                (ApmEntry::TYPE_FREE, 64, 8),
                (b"Apple_HFS", 64, 0),
                (b"Apple_HFS", 60, 8),
                (b"Apple_Boot", 40, 8),
            ],
        ));
        let mut map = ApplePartitionMap::open(&disk, &media(512, 63)).unwrap();
        let partitions: Vec<_> = map.partitions().collect::<Result<_>>().unwrap();
        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].type_name(), b"Apple_Boot");
        assert_eq!(partitions[0].partition_number(), 5);
    }

    #[test]
    fn test_corrupt_entry_ends_scan() {
        let mut raw = image(
            512,
            8192,
            &[(b"Apple_HFS", 16, 8), (b"Apple_HFS", 24, 8), (b"Apple_HFS", 32, 8)],
        );
        // Break the signature of the second partition entry.
        raw[3 * 512] = 0;
        let disk = MemDisk::new(raw);
        let mut map = ApplePartitionMap::open(&disk, &media(512, 100)).unwrap();
        let mut partitions = map.partitions();
        assert!(partitions.next().unwrap().is_ok());
        assert_eq!(
            partitions.next().unwrap().unwrap_err().status(),
            Status::VOLUME_CORRUPTED
        );
        assert!(partitions.next().is_none());
    }

    #[test]
    fn test_entry_read_error_ends_scan() {
        let mut disk = MemDisk::new(image(
            512,
            8192,
            &[(b"Apple_HFS", 16, 8), (b"Apple_HFS", 24, 8), (b"Apple_HFS", 32, 8)],
        ));
        // Entry 2 lives in APM block 3.
        disk.fail_at = Some(3 * 512);

        let mut map = ApplePartitionMap::open(&disk, &media(512, 100)).unwrap();
        let mut partitions = map.partitions();
        assert_eq!(partitions.next().unwrap().unwrap().partition_number(), 2);
        assert_eq!(
            partitions.next().unwrap().unwrap_err().status(),
            Status::DEVICE_ERROR
        );
        assert!(partitions.next().is_none());

        let reads = disk.reads.get();
        let mut installer = CountingInstaller::default();
        install_apple_child_handles(&disk, &media(512, 100), &mut installer).unwrap();
        assert_eq!(installer.installed, [2]);
        // Descriptor, map entry, entry 1 and the failed entry 2.
        assert_eq!(disk.reads.get() - reads, 4);
    }

    #[test]
    fn test_corrupt_entry_keeps_installed_children() {
        let mut raw = image(
            512,
            8192,
            &[(b"Apple_HFS", 16, 8), (b"Apple_HFS", 24, 8), (b"Apple_HFS", 32, 8)],
        );
        raw[3 * 512..3 * 512 + 2].copy_from_slice(b"XX");
        let disk = MemDisk::new(raw);

        let mut installer = CountingInstaller::default();
        install_apple_child_handles(&disk, &media(512, 100), &mut installer).unwrap();
        assert_eq!(installer.installed, [2]);
    }

    #[test]
    fn test_corrupt_first_entry_is_not_found() {
        let mut raw = image(512, 8192, &[(b"Apple_HFS", 16, 8), (b"Apple_HFS", 24, 8)]);
        raw[2 * 512] = 0;
        let disk = MemDisk::new(raw);

        let mut installer = CountingInstaller::default();
        let err =
            install_apple_child_handles(&disk, &media(512, 100), &mut installer).unwrap_err();
        assert_eq!(err.status(), Status::NOT_FOUND);
        assert!(installer.installed.is_empty());
    }

    #[test]
    fn test_hard_drive_node() {
        let disk = MemDisk::new(image(512, 8192, &[(b"Apple_HFS", 2048, 4096)]));
        let mut map = ApplePartitionMap::open(&disk, &media(512, 10_000)).unwrap();
        let node = map.partitions().next().unwrap().unwrap().hard_drive_node();

        let partition_number = node.partition_number;
        let partition_start = node.partition_start;
        let partition_size = node.partition_size;
        assert_eq!(partition_number, 2);
        assert_eq!(partition_start, 2048);
        assert_eq!(partition_size, 4096);
        assert_eq!(node.partition_format, PartitionFormat::APPLE);
        assert_eq!(node.header.length, [42, 0]);
    }
}
