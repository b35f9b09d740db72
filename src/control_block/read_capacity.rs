// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! READ CAPACITY (10 / 16) CDBs and their parameter data.

use anyhow::{Result, anyhow};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout,
    byteorder::{BigEndian, U32, U64},
};

use crate::control_block::common::{
    CommandDescriptorBlock, Control, ProtocolError, begin_decode,
};

const PMI_MASK: u8 = 0b0000_0001;

/// **SCSI READ CAPACITY(10)** (opcode 0x25).
///
/// - bytes 2..6 : LBA hint (meaningful only with PMI = 1)
/// - byte  8    : PMI (bit 0)
/// - byte  9    : CONTROL
///
/// The target ignores PMI: an in-memory store has no seek-time asymmetry to
/// report on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadCapacity10 {
    pub lba: u32,
    /// Partial Medium Indicator.
    pub pmi: bool,
    pub control: Control,
}

impl CommandDescriptorBlock for ReadCapacity10 {
    const OPERATION_CODE: u8 = 0x25;
    const SIZE: usize = 10;

    fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        begin_decode(buf, Self::OPERATION_CODE, Self::SIZE)?;
        buf.advance(1);
        let lba = buf.get_u32();
        buf.advance(2);
        let pmi = buf.get_u8() & PMI_MASK != 0;
        Ok(Self {
            lba,
            pmi,
            control: Control(buf.get_u8()),
        })
    }

    fn encode(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(Self::SIZE);
        out.put_u8(Self::OPERATION_CODE);
        out.put_u8(0);
        out.put_u32(self.lba);
        out.put_u16(0);
        out.put_u8(self.pmi as u8);
        out.put_u8(self.control.raw());
        out.freeze()
    }
}

/// **SCSI READ CAPACITY(16)** via SERVICE ACTION IN(16) (opcode 0x9E,
/// SA = 0x10).
///
/// - byte  1      : SERVICE ACTION (low 5 bits)
/// - bytes 2..10  : LBA hint
/// - bytes 10..14 : ALLOCATION LENGTH
/// - byte  14     : PMI (bit 0)
/// - byte  15     : CONTROL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadCapacity16 {
    pub lba: u64,
    pub allocation_length: u32,
    pub pmi: bool,
    pub control: Control,
}

impl ReadCapacity16 {
    pub const SERVICE_ACTION: u8 = 0x10;

    pub fn new(allocation_length: u32) -> Self {
        Self {
            allocation_length,
            ..Default::default()
        }
    }
}

impl CommandDescriptorBlock for ReadCapacity16 {
    const OPERATION_CODE: u8 = 0x9E;
    const SIZE: usize = 16;

    fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        begin_decode(buf, Self::OPERATION_CODE, Self::SIZE)?;
        let sa = buf.get_u8() & 0b0001_1111;
        if sa != Self::SERVICE_ACTION {
            return Err(ProtocolError::InvalidServiceAction {
                expected: Self::SERVICE_ACTION,
                found: sa,
            });
        }
        let lba = buf.get_u64();
        let allocation_length = buf.get_u32();
        let pmi = buf.get_u8() & PMI_MASK != 0;
        Ok(Self {
            lba,
            allocation_length,
            pmi,
            control: Control(buf.get_u8()),
        })
    }

    fn encode(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(Self::SIZE);
        out.put_u8(Self::OPERATION_CODE);
        out.put_u8(Self::SERVICE_ACTION);
        out.put_u64(self.lba);
        out.put_u32(self.allocation_length);
        out.put_u8(self.pmi as u8);
        out.put_u8(self.control.raw());
        out.freeze()
    }
}

/// Raw 8-byte parameter data returned by READ CAPACITY(10).
#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Debug, Clone, Copy)]
pub struct Rc10Raw {
    /// Reported capacity value (bytes 0-3), saturated at `0xFFFF_FFFF`.
    pub capacity: U32<BigEndian>,
    /// Block length in bytes (bytes 4-7).
    pub block_len: U32<BigEndian>,
}

/// Full 32-byte parameter data of READ CAPACITY(16). Only the first 12
/// bytes carry information, the rest is reserved.
#[repr(C)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable, Debug, Clone, Copy)]
pub struct Rc16Raw {
    pub capacity: U64<BigEndian>,
    pub block_len: U32<BigEndian>,
    pub reserved: [u8; 20],
}

impl Rc10Raw {
    pub const LEN: usize = 8;

    pub fn new(block_count: u64, block_len: u32) -> Self {
        Self {
            capacity: U32::new(block_count.min(u32::MAX as u64) as u32),
            block_len: U32::new(block_len),
        }
    }

    /// If true, the initiator should retry with READ CAPACITY(16).
    #[inline]
    pub fn indicates_overflow(&self) -> bool {
        self.capacity == u32::MAX
    }
}

impl Rc16Raw {
    pub const LEN: usize = 32;

    pub fn new(block_count: u64, block_len: u32) -> Self {
        Self {
            capacity: U64::new(block_count),
            block_len: U32::new(block_len),
            reserved: [0; 20],
        }
    }
}

/// Parse READ CAPACITY(10) parameter data (needs ≥ 8 bytes).
#[inline]
pub fn parse_read_capacity10_zerocopy(buf: &[u8]) -> Result<&Rc10Raw> {
    let (raw, _rest) = Rc10Raw::ref_from_prefix(buf)
        .map_err(|_| anyhow!("READ CAPACITY(10): need ≥ 8 bytes, got {}", buf.len()))?;
    Ok(raw)
}

/// Parse READ CAPACITY(16) parameter data (needs the full 32 bytes).
#[inline]
pub fn parse_read_capacity16_zerocopy(buf: &[u8]) -> Result<&Rc16Raw> {
    let (raw, _rest) = Rc16Raw::ref_from_prefix(buf)
        .map_err(|_| anyhow!("READ CAPACITY(16): need ≥ 32 bytes, got {}", buf.len()))?;
    Ok(raw)
}
