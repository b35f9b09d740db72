// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::control_block::common::{
    CommandDescriptorBlock, Control, ProtocolError, begin_decode,
};

/// TEST UNIT READY(6): opcode 0x00, four reserved bytes, CONTROL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestUnitReady {
    pub control: Control,
}

impl CommandDescriptorBlock for TestUnitReady {
    const OPERATION_CODE: u8 = 0x00;
    const SIZE: usize = 6;

    fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        begin_decode(buf, Self::OPERATION_CODE, Self::SIZE)?;
        buf.advance(4);
        Ok(Self {
            control: Control(buf.get_u8()),
        })
    }

    fn encode(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(Self::SIZE);
        out.put_u8(Self::OPERATION_CODE);
        out.put_u32(0);
        out.put_u8(self.control.raw());
        out.freeze()
    }
}
