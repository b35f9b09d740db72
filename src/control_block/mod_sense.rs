// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! MODE SENSE (6 / 10) codec.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::control_block::common::{
    CommandDescriptorBlock, Control, PageCode, PageControl, ProtocolError, begin_decode,
};

/// Page code that requests every supported page.
pub const ALL_PAGES: u8 = PageCode::MAX;

const DBD_MASK: u8 = 0b0000_1000;
const LLBAA_MASK: u8 = 0b0001_0000;

#[inline]
fn pc_page(pc: PageControl, page_code: PageCode) -> u8 {
    ((pc as u8) << 6) | page_code.get()
}

/// MODE SENSE(6).
/// Layout:
///   [0]=0x1A, [1]=DBD<<3, [2]=PC(7..6)|PAGE(5..0), [3]=SUBPAGE, [4]=ALLOC_LEN,
/// [5]=CONTROL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeSense6 {
    /// Disable Block Descriptors.
    pub dbd: bool,
    pub page_control: PageControl,
    pub page_code: PageCode,
    pub subpage_code: u8,
    pub allocation_length: u8,
    pub control: Control,
}

impl ModeSense6 {
    /// PC=Current, DBD=1, subpage=0, control=0. Only the low 6 bits of
    /// `page_code` are kept; use [`PageCode::new`] to reject wider values.
    pub fn simple(page_code: u8, allocation_length: u8) -> Self {
        Self {
            dbd: true,
            page_code: PageCode::from_byte(page_code),
            allocation_length,
            ..Default::default()
        }
    }
}

impl CommandDescriptorBlock for ModeSense6 {
    const OPERATION_CODE: u8 = 0x1A;
    const SIZE: usize = 6;

    fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        begin_decode(buf, Self::OPERATION_CODE, Self::SIZE)?;
        let b1 = buf.get_u8();
        let b2 = buf.get_u8();
        Ok(Self {
            dbd: b1 & DBD_MASK != 0,
            page_control: PageControl::from_bits(b2 >> 6),
            page_code: PageCode::from_byte(b2),
            subpage_code: buf.get_u8(),
            allocation_length: buf.get_u8(),
            control: Control(buf.get_u8()),
        })
    }

    fn encode(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(Self::SIZE);
        out.put_u8(Self::OPERATION_CODE);
        out.put_u8(if self.dbd { DBD_MASK } else { 0 });
        out.put_u8(pc_page(self.page_control, self.page_code));
        out.put_u8(self.subpage_code);
        out.put_u8(self.allocation_length);
        out.put_u8(self.control.raw());
        out.freeze()
    }
}

/// MODE SENSE(10).
/// Layout:
///   [0]=0x5A, [1]=LLBAA<<4 | DBD<<3, [2]=PC(7..6)|PAGE(5..0), [3]=SUBPAGE,
///   [4..7]=0, [7..9]=ALLOC_LEN(be), [9]=CONTROL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeSense10 {
    /// Long LBA Accepted.
    pub llbaa: bool,
    pub dbd: bool,
    pub page_control: PageControl,
    pub page_code: PageCode,
    pub subpage_code: u8,
    pub allocation_length: u16,
    pub control: Control,
}

impl ModeSense10 {
    /// PC=Current, DBD=1, LLBAA=0, subpage=0, control=0. Only the low 6 bits
    /// of `page_code` are kept.
    pub fn simple(page_code: u8, allocation_length: u16) -> Self {
        Self {
            dbd: true,
            page_code: PageCode::from_byte(page_code),
            allocation_length,
            ..Default::default()
        }
    }
}

impl CommandDescriptorBlock for ModeSense10 {
    const OPERATION_CODE: u8 = 0x5A;
    const SIZE: usize = 10;

    fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        begin_decode(buf, Self::OPERATION_CODE, Self::SIZE)?;
        let b1 = buf.get_u8();
        let b2 = buf.get_u8();
        let subpage_code = buf.get_u8();
        buf.advance(3);
        Ok(Self {
            llbaa: b1 & LLBAA_MASK != 0,
            dbd: b1 & DBD_MASK != 0,
            page_control: PageControl::from_bits(b2 >> 6),
            page_code: PageCode::from_byte(b2),
            subpage_code,
            allocation_length: buf.get_u16(),
            control: Control(buf.get_u8()),
        })
    }

    fn encode(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(Self::SIZE);
        out.put_u8(Self::OPERATION_CODE);
        out.put_u8(
            if self.llbaa { LLBAA_MASK } else { 0 } | if self.dbd { DBD_MASK } else { 0 },
        );
        out.put_u8(pc_page(self.page_control, self.page_code));
        out.put_u8(self.subpage_code);
        out.put_bytes(0, 3);
        out.put_u16(self.allocation_length);
        out.put_u8(self.control.raw());
        out.freeze()
    }
}
