// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! First byte of every iSCSI **Basic-Header-Segment** (RFC 7143 § 11.2.1.2):
//!
//! ```text
//!  7   6   5   4   3   2   1   0
//! +---+---+---------------------------+
//! | . | I |        OPCODE (6 bits)    |
//! +---+---+---------------------------+
//! ```

use core::fmt;

use thiserror::Error;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

const OPCODE_MASK: u8 = 0b0011_1111;
const I_MASK: u8 = 0b0100_0000;

/// Op-codes exchanged on the data path of a SCSI command.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    #[default]
    NopOut = 0x00,
    ScsiCommandReq = 0x01,
    ScsiTaskMgmtReq = 0x02,
    ScsiDataOut = 0x05,
    NopIn = 0x20,
    ScsiCommandResp = 0x21,
    ScsiTaskMgmtResp = 0x22,
    ScsiDataIn = 0x25,
    ReadyToTransfer = 0x31,
}

impl Opcode {
    #[inline]
    pub fn from_u6(v: u8) -> Option<Self> {
        Some(match v {
            0x00 => Self::NopOut,
            0x01 => Self::ScsiCommandReq,
            0x02 => Self::ScsiTaskMgmtReq,
            0x05 => Self::ScsiDataOut,
            0x20 => Self::NopIn,
            0x21 => Self::ScsiCommandResp,
            0x22 => Self::ScsiTaskMgmtResp,
            0x25 => Self::ScsiDataIn,
            0x31 => Self::ReadyToTransfer,
            _ => return None,
        })
    }
}

#[derive(Debug, Error)]
#[error("invalid opcode: 0x{0:02x}")]
pub struct UnknownOpcode(pub u8);

/// Typed representation of the very first BHS byte.
#[derive(Debug, PartialEq, Eq, Default)]
pub struct BhsOpcode {
    /// Immediate delivery flag.
    pub flags: bool,
    pub opcode: Opcode,
}

impl TryFrom<u8> for BhsOpcode {
    type Error = anyhow::Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        let code = byte & OPCODE_MASK;
        let opcode = Opcode::from_u6(code).ok_or(UnknownOpcode(code))?;
        Ok(Self {
            flags: (byte & I_MASK) != 0,
            opcode,
        })
    }
}

impl From<&BhsOpcode> for u8 {
    fn from(b: &BhsOpcode) -> u8 {
        let raw = b.opcode as u8;
        if b.flags { raw | I_MASK } else { raw }
    }
}

/// Wire-safe, zero-copy first BHS octet.
#[repr(transparent)]
#[derive(Clone, Default, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct RawBhsOpcode(u8);

impl RawBhsOpcode {
    #[inline]
    pub const fn raw(&self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn i(&self) -> bool {
        (self.0 & I_MASK) != 0
    }

    #[inline]
    pub const fn opcode_raw(&self) -> u8 {
        self.0 & OPCODE_MASK
    }

    #[inline]
    pub fn opcode_known(&self) -> Option<Opcode> {
        Opcode::from_u6(self.opcode_raw())
    }

    #[inline]
    pub fn set_opcode_known(&mut self, k: Opcode) {
        self.0 = (self.0 & !OPCODE_MASK) | (k as u8 & OPCODE_MASK)
    }

    pub fn of(k: Opcode) -> Self {
        let mut tmp = Self::default();
        tmp.set_opcode_known(k);
        tmp
    }
}

impl fmt::Debug for RawBhsOpcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tmp = f.debug_struct("RawBhsOpcode");
        if self.i() {
            tmp.field("I", &true);
        }
        match self.opcode_known() {
            Some(op) => tmp.field("opcode", &op),
            None => tmp.field("opcode_raw", &format_args!("0x{:02X}", self.opcode_raw())),
        };
        tmp.finish()
    }
}
