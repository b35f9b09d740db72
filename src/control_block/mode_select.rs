// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! MODE SELECT (6 / 10). The initiator sends a mode parameter list of
//! `parameter_list_length` bytes as Data-Out after the command.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::control_block::common::{
    CommandDescriptorBlock, Control, ProtocolError, begin_decode,
};

const PF_MASK: u8 = 0b0001_0000;
const SP_MASK: u8 = 0b0000_0001;

/// MODE SELECT(6).
/// Layout:
///   [0]=0x15, [1]=PF(4)|SP(0), [2..4]=reserved, [4]=PARAMETER LIST LENGTH,
///   [5]=CONTROL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeSelect6 {
    /// Page Format: parameter list uses the standard page format.
    pub page_format: bool,
    /// Save Pages: persist the pages across power cycles.
    pub save_pages: bool,
    pub parameter_list_length: u8,
    pub control: Control,
}

impl ModeSelect6 {
    pub fn new(page_format: bool, save_pages: bool, parameter_list_length: u8) -> Self {
        Self {
            page_format,
            save_pages,
            parameter_list_length,
            control: Control::default(),
        }
    }
}

impl CommandDescriptorBlock for ModeSelect6 {
    const OPERATION_CODE: u8 = 0x15;
    const SIZE: usize = 6;

    fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        begin_decode(buf, Self::OPERATION_CODE, Self::SIZE)?;
        let b1 = buf.get_u8();
        buf.advance(2);
        let parameter_list_length = buf.get_u8();
        let control = Control(buf.get_u8());
        Ok(Self {
            page_format: b1 & PF_MASK != 0,
            save_pages: b1 & SP_MASK != 0,
            parameter_list_length,
            control,
        })
    }

    fn encode(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(Self::SIZE);
        out.put_u8(Self::OPERATION_CODE);
        out.put_u8(
            if self.save_pages { SP_MASK } else { 0 }
                | if self.page_format { PF_MASK } else { 0 },
        );
        out.put_u16(0);
        out.put_u8(self.parameter_list_length);
        out.put_u8(self.control.raw());
        out.freeze()
    }
}

/// MODE SELECT(10).
/// Layout:
///   [0]=0x55, [1]=PF(4)|SP(0), [2..7]=reserved, [7..9]=PARAMETER LIST
///   LENGTH(be), [9]=CONTROL
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeSelect10 {
    pub page_format: bool,
    pub save_pages: bool,
    pub parameter_list_length: u16,
    pub control: Control,
}

impl ModeSelect10 {
    pub fn new(page_format: bool, save_pages: bool, parameter_list_length: u16) -> Self {
        Self {
            page_format,
            save_pages,
            parameter_list_length,
            control: Control::default(),
        }
    }
}

impl CommandDescriptorBlock for ModeSelect10 {
    const OPERATION_CODE: u8 = 0x55;
    const SIZE: usize = 10;

    fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        begin_decode(buf, Self::OPERATION_CODE, Self::SIZE)?;
        let b1 = buf.get_u8();
        buf.advance(5);
        let parameter_list_length = buf.get_u16();
        let control = Control(buf.get_u8());
        Ok(Self {
            page_format: b1 & PF_MASK != 0,
            save_pages: b1 & SP_MASK != 0,
            parameter_list_length,
            control,
        })
    }

    fn encode(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(Self::SIZE);
        out.put_u8(Self::OPERATION_CODE);
        out.put_u8(
            if self.save_pages { SP_MASK } else { 0 }
                | if self.page_format { PF_MASK } else { 0 },
        );
        out.put_bytes(0, 5);
        out.put_u16(self.parameter_list_length);
        out.put_u8(self.control.raw());
        out.freeze()
    }
}
