// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! WRITE (6 / 10 / 12 / 16) codec. Same layouts as the READ family, only the
//! operation codes differ.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::control_block::{
    common::{
        CdbFieldError, CommandDescriptorBlock, Control, GroupNumber, ProtocolError, RwFlags,
        begin_decode, check_field,
    },
    read::MAX_LBA_6,
};


/// **SCSI WRITE(6)**: opcode 0x0A, 21-bit LBA, TRANSFER LENGTH 0 => 256 blocks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Write6 {
    lba: u32,
    pub transfer_length: u8,
    pub control: Control,
}

impl Write6 {
    pub fn new(lba: u32, transfer_length: u8) -> Result<Self, CdbFieldError> {
        check_field("WRITE(6) LBA", lba as u64, MAX_LBA_6 as u64)?;
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

    #[inline]
    pub fn blocks(&self) -> u32 {
        if self.transfer_length == 0 {
            256
        } else {
            self.transfer_length as u32
        }
    }
}

impl CommandDescriptorBlock for Write6 {
    const OPERATION_CODE: u8 = 0x0A;
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

/// **SCSI WRITE(10)**.
///
/// - byte 0      : OPERATION CODE = 0x2A
/// - byte 1      : WRPROTECT[7:5] | DPO[4] | FUA[3] | FUA_NV[1]
/// - bytes 2..6  : LBA (big-endian, 32-bit)
/// - byte 6      : GROUP NUMBER (low 5 bits)
/// - bytes 7..9  : TRANSFER LENGTH (big-endian, 16-bit)
/// - byte 9      : CONTROL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Write10 {
    pub flags: RwFlags,
    pub lba: u32,
    pub group_number: GroupNumber,
    pub transfer_length: u16,
    pub control: Control,
}

impl Write10 {
    pub fn new(lba: u32, transfer_length: u16) -> Self {
        Self {
            lba,
            transfer_length,
            ..Default::default()
        }
    }
}

impl CommandDescriptorBlock for Write10 {
    const OPERATION_CODE: u8 = 0x2A;
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

/// **SCSI WRITE(12)**: opcode 0xAA, 32-bit LBA, 32-bit TRANSFER LENGTH.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Write12 {
    pub flags: RwFlags,
    pub lba: u32,
    pub transfer_length: u32,
    pub group_number: GroupNumber,
    pub control: Control,
}

impl Write12 {
    pub fn new(lba: u32, transfer_length: u32) -> Self {
        Self {
            lba,
            transfer_length,
            ..Default::default()
        }
    }
}

impl CommandDescriptorBlock for Write12 {
    const OPERATION_CODE: u8 = 0xAA;
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

/// **SCSI WRITE(16)**.
///
/// - byte  0      : OPERATION CODE = 0x8A
/// - byte  1      : flags (reserved bits must be 0)
/// - bytes 2..10  : LBA (big-endian, 64-bit)
/// - bytes 10..14 : TRANSFER LENGTH (big-endian, 32-bit; **0 => 0 blocks**)
/// - byte  14     : GROUP NUMBER (low 5 bits)
/// - byte  15     : CONTROL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Write16 {
    pub flags: RwFlags,
    pub lba: u64,
    pub transfer_length: u32,
    pub group_number: GroupNumber,
    pub control: Control,
}

impl Write16 {
    pub fn new(lba: u64, transfer_length: u32) -> Self {
        Self {
            lba,
            transfer_length,
            ..Default::default()
        }
    }
}

impl CommandDescriptorBlock for Write16 {
    const OPERATION_CODE: u8 = 0x8A;
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
