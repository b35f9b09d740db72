// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! READ (6 / 10 / 12 / 16) codec.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::control_block::common::{
    CdbFieldError, CommandDescriptorBlock, Control, GroupNumber, ProtocolError, RwFlags,
    begin_decode, check_field,
};

/// Largest LBA representable in the 21-bit field of READ(6)/WRITE(6).
pub const MAX_LBA_6: u32 = 0x1F_FFFF;

/// **SCSI READ(6)**.
///
/// - byte 0     : OPERATION CODE = 0x08
/// - bytes 1..4 : LBA (21 bits, big-endian, upper 3 bits of byte 1 reserved)
/// - byte 4     : TRANSFER LENGTH (**0 => 256 blocks**)
/// - byte 5     : CONTROL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Read6 {
    lba: u32,
    pub transfer_length: u8,
    pub control: Control,
}

impl Read6 {
    pub fn new(lba: u32, transfer_length: u8) -> Result<Self, CdbFieldError> {
        check_field("READ(6) LBA", lba as u64, MAX_LBA_6 as u64)?;
        Ok(Self {
            lba,
            transfer_length,
            control: Control::default(),
        })
    }

    #[inline]
    pub fn lba(&self) -> u32 {
        self.lba
    }

    /// Number of blocks to transfer; the zero encoding stands for 256.
    #[inline]
    pub fn blocks(&self) -> u32 {
        if self.transfer_length == 0 {
            256
        } else {
            self.transfer_length as u32
        }
    }
}

impl CommandDescriptorBlock for Read6 {
    const OPERATION_CODE: u8 = 0x08;
    const SIZE: usize = 6;

    fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        begin_decode(buf, Self::OPERATION_CODE, Self::SIZE)?;
        let lba = ((buf.get_u8() as u32) << 16 | buf.get_u16() as u32) & MAX_LBA_6;
        Ok(Self {
            lba,
            transfer_length: buf.get_u8(),
            control: Control(buf.get_u8()),
        })
    }

    fn encode(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(Self::SIZE);
        out.put_u8(Self::OPERATION_CODE);
        out.put_u8(((self.lba >> 16) as u8) & 0b0001_1111);
        out.put_u16(self.lba as u16);
        out.put_u8(self.transfer_length);
        out.put_u8(self.control.raw());
        out.freeze()
    }
}

/// **SCSI READ(10)** (SBC-3 § 5.11).
///
/// - byte 0      : OPERATION CODE = 0x28
/// - byte 1      : RDPROTECT[7:5] | DPO[4] | FUA[3] | FUA_NV[1]
/// - bytes 2..6  : LBA (big-endian, 32-bit)
/// - byte 6      : GROUP NUMBER (low 5 bits)
/// - bytes 7..9  : TRANSFER LENGTH (big-endian, 16-bit)
/// - byte 9      : CONTROL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Read10 {
    pub flags: RwFlags,
    pub lba: u32,
    pub group_number: GroupNumber,
    pub transfer_length: u16,
    pub control: Control,
}

impl Read10 {
    pub fn new(lba: u32, transfer_length: u16) -> Self {
        Self {
            lba,
            transfer_length,
            ..Default::default()
        }
    }
}

impl CommandDescriptorBlock for Read10 {
    const OPERATION_CODE: u8 = 0x28;
    const SIZE: usize = 10;

    fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        begin_decode(buf, Self::OPERATION_CODE, Self::SIZE)?;
        Ok(Self {
            flags: RwFlags::from_byte(buf.get_u8()),
            lba: buf.get_u32(),
            group_number: GroupNumber::from_byte(buf.get_u8()),
            transfer_length: buf.get_u16(),
            control: Control(buf.get_u8()),
        })
    }

    fn encode(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(Self::SIZE);
        out.put_u8(Self::OPERATION_CODE);
        out.put_u8(self.flags.to_byte());
        out.put_u32(self.lba);
        out.put_u8(self.group_number.get());
        out.put_u16(self.transfer_length);
        out.put_u8(self.control.raw());
        out.freeze()
    }
}

/// **SCSI READ(12)**.
///
/// - byte 0       : OPERATION CODE = 0xA8
/// - byte 1       : flags (as READ(10))
/// - bytes 2..6   : LBA (big-endian, 32-bit)
/// - bytes 6..10  : TRANSFER LENGTH (big-endian, 32-bit)
/// - byte 10      : GROUP NUMBER
/// - byte 11      : CONTROL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Read12 {
    pub flags: RwFlags,
    pub lba: u32,
    pub transfer_length: u32,
    pub group_number: GroupNumber,
    pub control: Control,
}

impl Read12 {
    pub fn new(lba: u32, transfer_length: u32) -> Self {
        Self {
            lba,
            transfer_length,
            ..Default::default()
        }
    }
}

impl CommandDescriptorBlock for Read12 {
    const OPERATION_CODE: u8 = 0xA8;
    const SIZE: usize = 12;

    fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        begin_decode(buf, Self::OPERATION_CODE, Self::SIZE)?;
        Ok(Self {
            flags: RwFlags::from_byte(buf.get_u8()),
            lba: buf.get_u32(),
            transfer_length: buf.get_u32(),
            group_number: GroupNumber::from_byte(buf.get_u8()),
            control: Control(buf.get_u8()),
        })
    }

    fn encode(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(Self::SIZE);
        out.put_u8(Self::OPERATION_CODE);
        out.put_u8(self.flags.to_byte());
        out.put_u32(self.lba);
        out.put_u32(self.transfer_length);
        out.put_u8(self.group_number.get());
        out.put_u8(self.control.raw());
        out.freeze()
    }
}

/// **SCSI READ(16)**.
///
/// - byte  0      : OPERATION CODE = 0x88
/// - byte  1      : flags (as READ(10))
/// - bytes 2..10  : LBA (big-endian, 64-bit)
/// - bytes 10..14 : TRANSFER LENGTH (big-endian, 32-bit)
/// - byte  14     : GROUP NUMBER
/// - byte  15     : CONTROL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Read16 {
    pub flags: RwFlags,
    pub lba: u64,
    pub transfer_length: u32,
    pub group_number: GroupNumber,
    pub control: Control,
}

impl Read16 {
    pub fn new(lba: u64, transfer_length: u32) -> Self {
        Self {
            lba,
            transfer_length,
            ..Default::default()
        }
    }
}

impl CommandDescriptorBlock for Read16 {
    const OPERATION_CODE: u8 = 0x88;
    const SIZE: usize = 16;

    fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        begin_decode(buf, Self::OPERATION_CODE, Self::SIZE)?;
        Ok(Self {
            flags: RwFlags::from_byte(buf.get_u8()),
            lba: buf.get_u64(),
            transfer_length: buf.get_u32(),
            group_number: GroupNumber::from_byte(buf.get_u8()),
            control: Control(buf.get_u8()),
        })
    }

    fn encode(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(Self::SIZE);
        out.put_u8(Self::OPERATION_CODE);
        out.put_u8(self.flags.to_byte());
        out.put_u64(self.lba);
        out.put_u32(self.transfer_length);
        out.put_u8(self.group_number.get());
        out.put_u8(self.control.raw());
        out.freeze()
    }
}
