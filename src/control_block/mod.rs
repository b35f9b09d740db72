// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! SCSI Command Descriptor Blocks understood by the target.
//!
//! Every variant lives in its own struct implementing
//! [`common::CommandDescriptorBlock`]; [`Cdb`] is the closed union the rest of
//! the crate dispatches on.

pub mod common;
pub mod inquiry;
pub mod mod_sense;
pub mod mode_select;
pub mod read;
pub mod read_capacity;
pub mod report_luns;
pub mod request_sense;
pub mod test_unit_ready;
pub mod write;

use bytes::{Buf, Bytes};

use crate::control_block::{
    common::{CommandDescriptorBlock, Control, ProtocolError},
    inquiry::Inquiry,
    mod_sense::{ModeSense6, ModeSense10},
    mode_select::{ModeSelect6, ModeSelect10},
    read::{Read6, Read10, Read12, Read16},
    read_capacity::{ReadCapacity10, ReadCapacity16},
    report_luns::ReportLuns,
    request_sense::RequestSense,
    test_unit_ready::TestUnitReady,
    write::{Write6, Write10, Write12, Write16},
};

/// Runtime identity of a [`Cdb`] variant, used as the dispatch key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CdbKind {
    TestUnitReady,
    RequestSense,
    Read6,
    Write6,
    Inquiry,
    ModeSelect6,
    ModeSense6,
    ReadCapacity10,
    Read10,
    Write10,
    ModeSelect10,
    ModeSense10,
    Read16,
    Write16,
    ReadCapacity16,
    ReportLuns,
    Read12,
    Write12,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cdb {
    TestUnitReady(TestUnitReady),
    RequestSense(RequestSense),
    Read6(Read6),
    Write6(Write6),
    Inquiry(Inquiry),
    ModeSelect6(ModeSelect6),
    ModeSense6(ModeSense6),
    ReadCapacity10(ReadCapacity10),
    Read10(Read10),
    Write10(Write10),
    ModeSelect10(ModeSelect10),
    ModeSense10(ModeSense10),
    Read16(Read16),
    Write16(Write16),
    ReadCapacity16(ReadCapacity16),
    ReportLuns(ReportLuns),
    Read12(Read12),
    Write12(Write12),
}

impl Cdb {
    /// Peek the operation code and decode the matching variant.
    pub fn decode(buf: &mut impl Buf) -> Result<Self, ProtocolError> {
        let opcode = *buf
            .chunk()
            .first()
            .ok_or(ProtocolError::Truncated { need: 1, got: 0 })?;
        Ok(match opcode {
            TestUnitReady::OPERATION_CODE => Self::TestUnitReady(TestUnitReady::decode(buf)?),
            RequestSense::OPERATION_CODE => Self::RequestSense(RequestSense::decode(buf)?),
            Read6::OPERATION_CODE => Self::Read6(Read6::decode(buf)?),
            Write6::OPERATION_CODE => Self::Write6(Write6::decode(buf)?),
            Inquiry::OPERATION_CODE => Self::Inquiry(Inquiry::decode(buf)?),
            ModeSelect6::OPERATION_CODE => Self::ModeSelect6(ModeSelect6::decode(buf)?),
            ModeSense6::OPERATION_CODE => Self::ModeSense6(ModeSense6::decode(buf)?),
            ReadCapacity10::OPERATION_CODE => {
                Self::ReadCapacity10(ReadCapacity10::decode(buf)?)
            },
            Read10::OPERATION_CODE => Self::Read10(Read10::decode(buf)?),
            Write10::OPERATION_CODE => Self::Write10(Write10::decode(buf)?),
            ModeSelect10::OPERATION_CODE => Self::ModeSelect10(ModeSelect10::decode(buf)?),
            ModeSense10::OPERATION_CODE => Self::ModeSense10(ModeSense10::decode(buf)?),
            Read16::OPERATION_CODE => Self::Read16(Read16::decode(buf)?),
            Write16::OPERATION_CODE => Self::Write16(Write16::decode(buf)?),
            ReadCapacity16::OPERATION_CODE => {
                Self::ReadCapacity16(ReadCapacity16::decode(buf)?)
            },
            ReportLuns::OPERATION_CODE => Self::ReportLuns(ReportLuns::decode(buf)?),
            Read12::OPERATION_CODE => Self::Read12(Read12::decode(buf)?),
            Write12::OPERATION_CODE => Self::Write12(Write12::decode(buf)?),
            other => return Err(ProtocolError::UnsupportedOperationCode(other)),
        })
    }

    /// Decode from the 16-byte CDB field of a SCSI Command PDU.
    pub fn from_padded(raw: &[u8; 16]) -> Result<Self, ProtocolError> {
        Self::decode(&mut &raw[..])
    }

    pub fn kind(&self) -> CdbKind {
        match self {
            Self::TestUnitReady(_) => CdbKind::TestUnitReady,
            Self::RequestSense(_) => CdbKind::RequestSense,
            Self::Read6(_) => CdbKind::Read6,
            Self::Write6(_) => CdbKind::Write6,
            Self::Inquiry(_) => CdbKind::Inquiry,
            Self::ModeSelect6(_) => CdbKind::ModeSelect6,
            Self::ModeSense6(_) => CdbKind::ModeSense6,
            Self::ReadCapacity10(_) => CdbKind::ReadCapacity10,
            Self::Read10(_) => CdbKind::Read10,
            Self::Write10(_) => CdbKind::Write10,
            Self::ModeSelect10(_) => CdbKind::ModeSelect10,
            Self::ModeSense10(_) => CdbKind::ModeSense10,
            Self::Read16(_) => CdbKind::Read16,
            Self::Write16(_) => CdbKind::Write16,
            Self::ReadCapacity16(_) => CdbKind::ReadCapacity16,
            Self::ReportLuns(_) => CdbKind::ReportLuns,
            Self::Read12(_) => CdbKind::Read12,
            Self::Write12(_) => CdbKind::Write12,
        }
    }

    pub fn operation_code(&self) -> u8 {
        match self {
            Self::TestUnitReady(_) => TestUnitReady::OPERATION_CODE,
            Self::RequestSense(_) => RequestSense::OPERATION_CODE,
            Self::Read6(_) => Read6::OPERATION_CODE,
            Self::Write6(_) => Write6::OPERATION_CODE,
            Self::Inquiry(_) => Inquiry::OPERATION_CODE,
            Self::ModeSelect6(_) => ModeSelect6::OPERATION_CODE,
            Self::ModeSense6(_) => ModeSense6::OPERATION_CODE,
            Self::ReadCapacity10(_) => ReadCapacity10::OPERATION_CODE,
            Self::Read10(_) => Read10::OPERATION_CODE,
            Self::Write10(_) => Write10::OPERATION_CODE,
            Self::ModeSelect10(_) => ModeSelect10::OPERATION_CODE,
            Self::ModeSense10(_) => ModeSense10::OPERATION_CODE,
            Self::Read16(_) => Read16::OPERATION_CODE,
            Self::Write16(_) => Write16::OPERATION_CODE,
            Self::ReadCapacity16(_) => ReadCapacity16::OPERATION_CODE,
            Self::ReportLuns(_) => ReportLuns::OPERATION_CODE,
            Self::Read12(_) => Read12::OPERATION_CODE,
            Self::Write12(_) => Write12::OPERATION_CODE,
        }
    }

    pub fn encode(&self) -> Bytes {
        match self {
            Self::TestUnitReady(c) => c.encode(),
            Self::RequestSense(c) => c.encode(),
            Self::Read6(c) => c.encode(),
            Self::Write6(c) => c.encode(),
            Self::Inquiry(c) => c.encode(),
            Self::ModeSelect6(c) => c.encode(),
            Self::ModeSense6(c) => c.encode(),
            Self::ReadCapacity10(c) => c.encode(),
            Self::Read10(c) => c.encode(),
            Self::Write10(c) => c.encode(),
            Self::ModeSelect10(c) => c.encode(),
            Self::ModeSense10(c) => c.encode(),
            Self::Read16(c) => c.encode(),
            Self::Write16(c) => c.encode(),
            Self::ReadCapacity16(c) => c.encode(),
            Self::ReportLuns(c) => c.encode(),
            Self::Read12(c) => c.encode(),
            Self::Write12(c) => c.encode(),
        }
    }

    pub fn size(&self) -> usize {
        match self {
            Self::TestUnitReady(c) => c.size(),
            Self::RequestSense(c) => c.size(),
            Self::Read6(c) => c.size(),
            Self::Write6(c) => c.size(),
            Self::Inquiry(c) => c.size(),
            Self::ModeSelect6(c) => c.size(),
            Self::ModeSense6(c) => c.size(),
            Self::ReadCapacity10(c) => c.size(),
            Self::Read10(c) => c.size(),
            Self::Write10(c) => c.size(),
            Self::ModeSelect10(c) => c.size(),
            Self::ModeSense10(c) => c.size(),
            Self::Read16(c) => c.size(),
            Self::Write16(c) => c.size(),
            Self::ReadCapacity16(c) => c.size(),
            Self::ReportLuns(c) => c.size(),
            Self::Read12(c) => c.size(),
            Self::Write12(c) => c.size(),
        }
    }

    pub fn control(&self) -> Control {
        match self {
            Self::TestUnitReady(c) => c.control,
            Self::RequestSense(c) => c.control,
            Self::Read6(c) => c.control,
            Self::Write6(c) => c.control,
            Self::Inquiry(c) => c.control,
            Self::ModeSelect6(c) => c.control,
            Self::ModeSense6(c) => c.control,
            Self::ReadCapacity10(c) => c.control,
            Self::Read10(c) => c.control,
            Self::Write10(c) => c.control,
            Self::ModeSelect10(c) => c.control,
            Self::ModeSense10(c) => c.control,
            Self::Read16(c) => c.control,
            Self::Write16(c) => c.control,
            Self::ReadCapacity16(c) => c.control,
            Self::ReportLuns(c) => c.control,
            Self::Read12(c) => c.control,
            Self::Write12(c) => c.control,
        }
    }

    /// `(lba, blocks)` of a READ/WRITE variant, `None` for anything else.
    pub fn block_transfer(&self) -> Option<(u64, u32)> {
        Some(match self {
            Self::Read6(c) => (c.lba() as u64, c.blocks()),
            Self::Write6(c) => (c.lba() as u64, c.blocks()),
            Self::Read10(c) => (c.lba as u64, c.transfer_length as u32),
            Self::Write10(c) => (c.lba as u64, c.transfer_length as u32),
            Self::Read12(c) => (c.lba as u64, c.transfer_length),
            Self::Write12(c) => (c.lba as u64, c.transfer_length),
            Self::Read16(c) => (c.lba, c.transfer_length),
            Self::Write16(c) => (c.lba, c.transfer_length),
            _ => return None,
        })
    }

    #[inline]
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            Self::Write6(_) | Self::Write10(_) | Self::Write12(_) | Self::Write16(_)
        )
    }
}
