// SPDX-License-Identifier: MIT OR Apache-2.0

//! The device-path nodes handed to the partition child installer.

newtype_enum! {
    /// Device path type.
    pub enum DeviceType: u8 => {
        /// Media device path.
        MEDIA = 0x04,
        /// End of a device path.
        END = 0x7f,
    }
}

newtype_enum! {
    /// Media device path sub-type.
    pub enum MediaSubType: u8 => {
        /// Hard drive partition.
        HARD_DRIVE = 0x01,
    }
}

newtype_enum! {
    /// Hard drive partition format.
    pub enum PartitionFormat: u8 => {
        /// MBR (PC-AT compatible Master Boot Record) format.
        MBR = 0x01,
        /// GPT (GUID Partition Table) format.
        GPT = 0x02,
        /// Apple Partition Map format.
        APPLE = 0x03,
    }
}

newtype_enum! {
    /// Kind of disk signature stored in a hard drive node.
    pub enum SignatureType: u8 => {
        /// No disk signature.
        NONE = 0x00,
        /// 32-bit MBR signature.
        MBR = 0x01,
        /// GUID signature.
        GUID = 0x02,
    }
}

/// Header that appears at the start of every device path node.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(C)]
pub struct DevicePathHeader {
    pub device_type: DeviceType,
    pub sub_type: MediaSubType,
    pub length: [u8; 2],
}

/// Media hard drive node describing one partition of a disk.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(C, packed)]
pub struct HardDriveMediaDevicePath {
    pub header: DevicePathHeader,
    pub partition_number: u32,
    pub partition_start: u64,
    pub partition_size: u64,
    pub partition_signature: [u8; 16],
    pub partition_format: PartitionFormat,
    pub signature_type: SignatureType,
}

impl HardDriveMediaDevicePath {
    /// Size of the node in bytes, as stored in its header.
    pub const LENGTH: u16 = 42;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hard_drive_node_size() {
        assert_eq!(
            size_of::<HardDriveMediaDevicePath>(),
            usize::from(HardDriveMediaDevicePath::LENGTH)
        );
    }
}
