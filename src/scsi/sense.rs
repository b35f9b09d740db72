// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Sense exceptions raised while executing a task. They never leave the task
//! boundary as errors: the task turns them into CHECK CONDITION plus
//! fixed-format sense data.

use thiserror::Error;

use crate::models::data::sense_data::{SenseData, asc_ascq_to_str};

/// SCSI sense key codes
pub mod sense_key {
    pub const NO_SENSE: u8 = 0x00;
    pub const NOT_READY: u8 = 0x02;
    pub const MEDIUM_ERROR: u8 = 0x03;
    pub const HARDWARE_ERROR: u8 = 0x04;
    pub const ILLEGAL_REQUEST: u8 = 0x05;
    pub const UNIT_ATTENTION: u8 = 0x06;
    pub const ABORTED_COMMAND: u8 = 0x0B;
}

/// Additional Sense Code (ASC) values
pub mod asc {
    pub const WRITE_ERROR: u8 = 0x0C;
    pub const UNRECOVERED_READ_ERROR: u8 = 0x11;
    pub const INVALID_COMMAND_OPERATION_CODE: u8 = 0x20;
    pub const LBA_OUT_OF_RANGE: u8 = 0x21;
    pub const INVALID_FIELD_IN_CDB: u8 = 0x24;
    pub const LOGICAL_UNIT_NOT_SUPPORTED: u8 = 0x25;
    pub const INVALID_FIELD_IN_PARAMETER_LIST: u8 = 0x26;
    pub const INTERNAL_TARGET_FAILURE: u8 = 0x44;
    pub const OVERLAPPED_COMMANDS_ATTEMPTED: u8 = 0x4E;
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error(
    "sense key {sense_key:#04x}, asc/ascq {asc:#04x}/{ascq:#04x}: {}",
    describe(.asc, .ascq)
)]
pub struct SenseException {
    pub sense_key: u8,
    pub asc: u8,
    pub ascq: u8,
    /// INFORMATION field, e.g. the offending LBA.
    pub information: Option<u32>,
}

fn describe(asc: &u8, ascq: &u8) -> &'static str {
    asc_ascq_to_str(*asc, *ascq)
}

impl SenseException {
    pub const fn new(sense_key: u8, asc: u8, ascq: u8) -> Self {
        Self {
            sense_key,
            asc,
            ascq,
            information: None,
        }
    }

    pub const fn with_information(mut self, information: u32) -> Self {
        self.information = Some(information);
        self
    }

    /// ILLEGAL REQUEST / INVALID COMMAND OPERATION CODE: no task is
    /// registered for the CDB.
    pub const fn invalid_command_operation_code() -> Self {
        Self::new(
            sense_key::ILLEGAL_REQUEST,
            asc::INVALID_COMMAND_OPERATION_CODE,
            0,
        )
    }

    pub const fn invalid_field_in_cdb() -> Self {
        Self::new(sense_key::ILLEGAL_REQUEST, asc::INVALID_FIELD_IN_CDB, 0)
    }

    pub const fn invalid_field_in_parameter_list() -> Self {
        Self::new(
            sense_key::ILLEGAL_REQUEST,
            asc::INVALID_FIELD_IN_PARAMETER_LIST,
            0,
        )
    }

    pub const fn lba_out_of_range() -> Self {
        Self::new(sense_key::ILLEGAL_REQUEST, asc::LBA_OUT_OF_RANGE, 0)
    }

    pub const fn logical_unit_not_supported() -> Self {
        Self::new(
            sense_key::ILLEGAL_REQUEST,
            asc::LOGICAL_UNIT_NOT_SUPPORTED,
            0,
        )
    }

    pub const fn overlapped_commands_attempted() -> Self {
        Self::new(
            sense_key::ABORTED_COMMAND,
            asc::OVERLAPPED_COMMANDS_ATTEMPTED,
            0,
        )
    }

    pub const fn internal_target_failure() -> Self {
        Self::new(sense_key::HARDWARE_ERROR, asc::INTERNAL_TARGET_FAILURE, 0)
    }

    pub const fn unrecovered_read_error() -> Self {
        Self::new(sense_key::MEDIUM_ERROR, asc::UNRECOVERED_READ_ERROR, 0)
    }

    pub const fn write_error() -> Self {
        Self::new(sense_key::MEDIUM_ERROR, asc::WRITE_ERROR, 0)
    }

    pub fn to_sense_data(&self) -> SenseData {
        let sense = SenseData::new(self.sense_key, self.asc, self.ascq);
        match self.information {
            Some(info) => sense.with_information(info),
            None => sense,
        }
    }

    /// Fixed-format sense bytes for the SCSI Response data segment.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_sense_data().to_bytes().to_vec()
    }
}
