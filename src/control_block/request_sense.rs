// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! REQUEST SENSE (6).
//!
//! CDB layout (SPC):
//!   [0] = 0x03 (REQUEST SENSE)
//!   [1] = DESC (bit 0), other bits reserved=0
//!   [2]..[3] = reserved (0)
//!   [4] = ALLOCATION LENGTH (number of bytes to return)
//!   [5] = CONTROL
//!
//! `desc=false` requests Fixed sense format; `desc=true` requests Descriptor
//! format.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::control_block::common::{
    CommandDescriptorBlock, Control, ProtocolError, begin_decode,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestSense {
    pub desc: bool,
    pub allocation_length: u8,
    pub control: Control,
}

impl RequestSense {
    /// DESC=0 (fixed format), CONTROL=0.
    pub fn simple(allocation_length: u8) -> Self {
        Self {
            allocation_length,
            ..Default::default()
        }
    }
}

impl CommandDescriptorBlock for RequestSense {
    const OPERATION_CODE: u8 = 0x03;
    const SIZE: usize = 6;

    fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        begin_decode(buf, Self::OPERATION_CODE, Self::SIZE)?;
        let desc = buf.get_u8() & 0x01 != 0;
        buf.advance(2);
        Ok(Self {
            desc,
            allocation_length: buf.get_u8(),
            control: Control(buf.get_u8()),
        })
    }

    fn encode(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(Self::SIZE);
        out.put_u8(Self::OPERATION_CODE);
        out.put_u8(self.desc as u8);
        out.put_u16(0);
        out.put_u8(self.allocation_length);
        out.put_u8(self.control.raw());
        out.freeze()
    }
}
