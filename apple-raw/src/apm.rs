// SPDX-License-Identifier: MIT OR Apache-2.0

//! On-disk layout of the Apple Partition Map.
//!
//! All multi-byte fields are stored big-endian. The big-endian wrappers are
//! byte arrays so that every structure here has an alignment of one and can
//! be read out of an arbitrary disk buffer with [`read_unaligned`].
//!
//! [`read_unaligned`]: core::ptr::read_unaligned

use core::fmt::{self, Debug, Formatter};

/// Big-endian 16-bit integer.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct Be16(pub [u8; 2]);

impl Be16 {
    /// Converts to native-endian `u16`.
    #[must_use]
    pub const fn get(self) -> u16 {
        u16::from_be_bytes(self.0)
    }

    /// Converts from native-endian `u16`.
    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value.to_be_bytes())
    }
}

impl Debug for Be16 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.get())
    }
}

/// Big-endian 32-bit integer.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash)]
#[repr(transparent)]
pub struct Be32(pub [u8; 4]);

impl Be32 {
    /// Converts to native-endian `u32`.
    #[must_use]
    pub const fn get(self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    /// Converts from native-endian `u32`.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value.to_be_bytes())
    }
}

impl Debug for Be32 {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.get())
    }
}

/// Length of the fixed-size name and type strings of a partition entry.
pub const APM_STRING_LENGTH: usize = 32;

/// Driver descriptor map, found in the first physical block of the device.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct ApmDriverDescriptor {
    /// Must be [`Self::SIGNATURE`].
    pub signature: Be16,
    /// Size of an APM block in bytes. All partition entries use this unit.
    pub block_size: Be16,
    /// Number of APM blocks on the device.
    pub block_count: Be32,
    pub device_type: Be16,
    pub device_id: Be16,
    pub data: Be32,
    pub driver_count: Be16,
}

impl ApmDriverDescriptor {
    /// `"ER"`.
    pub const SIGNATURE: u16 = 0x4552;
}

/// A partition map entry. One entry occupies one APM block; the structure
/// covers the full 512-byte record defined by Apple.
#[derive(Clone, Copy)]
#[repr(C)]
pub struct ApmEntry {
    /// Must be [`Self::SIGNATURE`].
    pub signature: Be16,
    pub signature_pad: Be16,
    /// Total number of entries in the map. Only meaningful in the entry
    /// describing the map itself.
    pub map_entry_count: Be32,
    /// First APM block of the partition.
    pub partition_start: Be32,
    /// Number of APM blocks in the partition.
    pub partition_size: Be32,
    pub name: [u8; APM_STRING_LENGTH],
    pub partition_type: [u8; APM_STRING_LENGTH],
    pub logical_data_start: Be32,
    pub data_count: Be32,
    pub status: Be32,
    pub logical_boot_start: Be32,
    pub boot_size: Be32,
    pub boot_address: Be32,
    pub boot_address2: Be32,
    pub boot_entry: Be32,
    pub boot_entry2: Be32,
    pub boot_checksum: Be32,
    pub processor: [u8; 16],
    pub pad: [u8; 376],
}

impl ApmEntry {
    /// `"PM"`.
    pub const SIGNATURE: u16 = 0x504d;

    /// Type of the entry describing the partition map itself.
    pub const TYPE_PARTITION_MAP: &'static [u8] = b"Apple_partition_map";

    /// Type of an entry describing unused space.
    pub const TYPE_FREE: &'static [u8] = b"Apple_Free";
}

impl Debug for ApmEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApmEntry")
            .field("signature", &self.signature)
            .field("map_entry_count", &self.map_entry_count)
            .field("partition_start", &self.partition_start)
            .field("partition_size", &self.partition_size)
            .field("name", &self.name)
            .field("partition_type", &self.partition_type)
            .finish_non_exhaustive()
    }
}
