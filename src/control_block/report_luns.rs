// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! REPORT LUNS (12-byte CDB).
//!
//! CDB layout (SPC):
//!   [0]  = 0xA0 (REPORT LUNS)
//!   [1]  = reserved
//!   [2]  = SELECT REPORT
//!   [3..6] = reserved
//!   [6..10] = ALLOCATION LENGTH (big-endian u32)
//!   [10] = reserved
//!   [11] = CONTROL

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::control_block::common::{
    CommandDescriptorBlock, Control, ProtocolError, begin_decode,
};

/// Common SELECT REPORT values (byte 2).
pub mod select_report {
    /// All logical unit addresses.
    pub const ALL: u8 = 0x00;
    /// Well known logical unit addresses.
    pub const WELL_KNOWN: u8 = 0x01;
    pub const ALL_MAPPED: u8 = 0x02;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportLuns {
    pub select_report: u8,
    pub allocation_length: u32,
    pub control: Control,
}

impl ReportLuns {
    pub fn new(select_report: u8, allocation_length: u32) -> Self {
        Self {
            select_report,
            allocation_length,
            control: Control::default(),
        }
    }
}

impl CommandDescriptorBlock for ReportLuns {
    const OPERATION_CODE: u8 = 0xA0;
    const SIZE: usize = 12;

    fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        begin_decode(buf, Self::OPERATION_CODE, Self::SIZE)?;
        buf.advance(1);
        let select_report = buf.get_u8();
        buf.advance(3);
        let allocation_length = buf.get_u32();
        buf.advance(1);
        Ok(Self {
            select_report,
            allocation_length,
            control: Control(buf.get_u8()),
        })
    }

    fn encode(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(Self::SIZE);
        out.put_u8(Self::OPERATION_CODE);
        out.put_u8(0);
        out.put_u8(self.select_report);
        out.put_bytes(0, 3);
        out.put_u32(self.allocation_length);
        out.put_u8(0);
        out.put_u8(self.control.raw());
        out.freeze()
    }
}
