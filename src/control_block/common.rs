// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Codec contract shared by every fixed-layout SCSI CDB.
//!
//! ```text
//!  byte 0            1 .. SIZE-2                  SIZE-1
//! +--------+-------------------------------------+---------+
//! | OPCODE |  variant fields (big-endian, bits)   | CONTROL |
//! +--------+-------------------------------------+---------+
//! ```

use bytes::{Buf, Bytes};
use thiserror::Error;

/// Malformed CDB on the wire.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("invalid operation code: expected 0x{expected:02x}, found 0x{found:02x}")]
    InvalidOperationCode { expected: u8, found: u8 },
    #[error("invalid service action: expected 0x{expected:02x}, found 0x{found:02x}")]
    InvalidServiceAction { expected: u8, found: u8 },
    #[error("truncated CDB: need {need} bytes, got {got}")]
    Truncated { need: usize, got: usize },
    #[error("unsupported operation code: 0x{0:02x}")]
    UnsupportedOperationCode(u8),
}

/// A field value that does not fit the variant's wire layout.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{field} = {value:#x} exceeds the maximum {max:#x}")]
pub struct CdbFieldError {
    pub field: &'static str,
    pub value: u64,
    pub max: u64,
}

/// Fixed-size encode/decode contract of one CDB variant.
pub trait CommandDescriptorBlock: Sized {
    /// Operation code at byte 0.
    const OPERATION_CODE: u8;
    /// Wire length; `encode()` always yields exactly this many bytes.
    const SIZE: usize;

    /// Parse from `buf`, reading the operation code first. Consumes exactly
    /// `SIZE` bytes on success.
    fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError>;

    /// Serialize in wire order. Never fails for a constructed value.
    fn encode(&self) -> Bytes;

    #[inline]
    fn size(&self) -> usize {
        Self::SIZE
    }

    /// iSCSI carries CDBs in a 16-byte field; shorter ones are zero padded.
    fn to_padded(&self) -> [u8; 16] {
        let mut cdb = [0u8; 16];
        let raw = self.encode();
        cdb[..raw.len()].copy_from_slice(&raw);
        cdb
    }
}

/// Validates the length and the operation code, consuming the opcode byte.
#[inline]
pub(crate) fn begin_decode(
    buf: &mut impl Buf,
    expected: u8,
    size: usize,
) -> Result<(), ProtocolError> {
    if buf.remaining() < size {
        return Err(ProtocolError::Truncated {
            need: size,
            got: buf.remaining(),
        });
    }
    let found = buf.get_u8();
    if found != expected {
        return Err(ProtocolError::InvalidOperationCode { expected, found });
    }
    Ok(())
}

#[inline]
pub(crate) fn check_field(field: &'static str, value: u64, max: u64) -> Result<(), CdbFieldError> {
    if value > max {
        return Err(CdbFieldError { field, value, max });
    }
    Ok(())
}

/// CONTROL byte, the last byte of every CDB (SAM-5 § 5.2).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Control(pub u8);

impl Control {
    const LINK: u8 = 0b0000_0001;
    const NACA: u8 = 0b0000_0100;

    #[inline]
    pub const fn new(linked: bool, normal_aca: bool) -> Self {
        Self((linked as u8) | ((normal_aca as u8) << 2))
    }

    #[inline]
    pub const fn raw(&self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn linked(&self) -> bool {
        self.0 & Self::LINK != 0
    }

    #[inline]
    pub const fn normal_aca(&self) -> bool {
        self.0 & Self::NACA != 0
    }
}

/// Byte 1 of READ/WRITE(10/12/16): PROTECT[7:5] | DPO[4] | FUA[3] | FUA_NV[1].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RwFlags {
    protect: u8,
    pub dpo: bool,
    pub fua: bool,
    pub fua_nv: bool,
}

impl RwFlags {
    const PROTECT_MAX: u8 = 0b111;

    pub fn new(protect: u8, dpo: bool, fua: bool, fua_nv: bool) -> Result<Self, CdbFieldError> {
        check_field("PROTECT", protect as u64, Self::PROTECT_MAX as u64)?;
        Ok(Self {
            protect,
            dpo,
            fua,
            fua_nv,
        })
    }

    /// RDPROTECT / WRPROTECT, 3 bits.
    #[inline]
    pub const fn protect(&self) -> u8 {
        self.protect
    }

    #[inline]
    pub fn from_byte(b: u8) -> Self {
        Self {
            protect: b >> 5,
            dpo: b & 0b0001_0000 != 0,
            fua: b & 0b0000_1000 != 0,
            fua_nv: b & 0b0000_0010 != 0,
        }
    }

    #[inline]
    pub fn to_byte(self) -> u8 {
        (self.protect << 5)
            | ((self.dpo as u8) << 4)
            | ((self.fua as u8) << 3)
            | ((self.fua_nv as u8) << 1)
    }
}

/// GROUP NUMBER of READ/WRITE(10/12/16), the low 5 bits of its byte.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupNumber(u8);

impl GroupNumber {
    pub const MAX: u8 = 0b0001_1111;

    pub fn new(value: u8) -> Result<Self, CdbFieldError> {
        check_field("GROUP NUMBER", value as u64, Self::MAX as u64)?;
        Ok(Self(value))
    }

    /// Keeps the low 5 bits of a wire byte.
    #[inline]
    pub const fn from_byte(b: u8) -> Self {
        Self(b & Self::MAX)
    }

    #[inline]
    pub const fn get(&self) -> u8 {
        self.0
    }
}

/// MODE SENSE page code, 6 bits; 0x3F asks for every page.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageCode(u8);

impl PageCode {
    pub const MAX: u8 = 0b0011_1111;

    pub fn new(value: u8) -> Result<Self, CdbFieldError> {
        check_field("PAGE CODE", value as u64, Self::MAX as u64)?;
        Ok(Self(value))
    }

    /// Keeps the low 6 bits of a wire byte.
    #[inline]
    pub const fn from_byte(b: u8) -> Self {
        Self(b & Self::MAX)
    }

    #[inline]
    pub const fn get(&self) -> u8 {
        self.0
    }
}

/// Page Control (PC) for MODE SENSE byte 2 (bits 7..6).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
#[repr(u8)]
pub enum PageControl {
    #[default]
    Current = 0b00,
    Changeable = 0b01,
    Default = 0b10,
    Saved = 0b11,
}

impl PageControl {
    #[inline]
    pub fn from_bits(v: u8) -> Self {
        match v & 0b11 {
            0b00 => Self::Current,
            0b01 => Self::Changeable,
            0b10 => Self::Default,
            _ => Self::Saved,
        }
    }
}
