// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::fmt;

use anyhow::{Context, Result, anyhow};

/// Sense data must be ≥ 18 bytes for fixed format.
pub const FIXED_MIN_LEN: usize = 18;
/// Current error, fixed format.
pub const RESPONSE_CODE_CURRENT: u8 = 0x70;

/// SPC-4 Table 43 — Fixed format sense-data byte layout
#[derive(Default, Clone, PartialEq)]
pub struct SenseData {
    pub valid: bool,        // bit7 of byte0
    pub response_code: u8,  // low-7 bits of byte0
    pub sense_key: u8,      // low-4 bits of byte2
    pub ili: bool,          // bit5 of byte2
    pub eom: bool,          // bit6 of byte2
    pub filemark: bool,     // bit7 of byte2
    pub information: u32,   // bytes 3-6
    pub additional_len: u8, // byte7
    pub cmd_specific: u32,  // bytes 8-11
    pub asc: u8,            // Additional Sense Code
    pub ascq: u8,           // Additional Sense Code Qualifier
}

impl SenseData {
    /// Current-error sense with the given key / ASC / ASCQ.
    pub fn new(sense_key: u8, asc: u8, ascq: u8) -> Self {
        Self {
            response_code: RESPONSE_CODE_CURRENT,
            sense_key: sense_key & 0x0F,
            additional_len: (FIXED_MIN_LEN - 8) as u8,
            asc,
            ascq,
            ..Default::default()
        }
    }

    /// Attach the INFORMATION field and set VALID.
    pub fn with_information(mut self, information: u32) -> Self {
        self.valid = true;
        self.information = information;
        self
    }

    /// Parse *fixed-format* sense-data (SPC-4 § 4.5.3).
    ///
    /// The buffer must be at least 18 bytes long.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < FIXED_MIN_LEN {
            return Err(anyhow!(
                "sense buffer too small: {} < {FIXED_MIN_LEN}",
                buf.len()
            ));
        }

        let information = u32::from_be_bytes(
            buf[3..7]
                .try_into()
                .context("failed to read Information field (bytes 3‥6)")?,
        );
        let cmd_specific = u32::from_be_bytes(
            buf[8..12]
                .try_into()
                .context("failed to read Cmd-specific field (bytes 8‥11)")?,
        );

        Ok(Self {
            valid: buf[0] & 0x80 != 0,
            response_code: buf[0] & 0x7F,
            sense_key: buf[2] & 0x0F,
            ili: buf[2] & 0x20 != 0,
            eom: buf[2] & 0x40 != 0,
            filemark: buf[2] & 0x80 != 0,
            information,
            additional_len: buf[7],
            cmd_specific,
            asc: buf[12],
            ascq: buf[13],
        })
    }

    /// Serialize to fixed format (18 bytes).
    pub fn to_bytes(&self) -> [u8; FIXED_MIN_LEN] {
        let mut data = [0u8; FIXED_MIN_LEN];
        data[0] = ((self.valid as u8) << 7) | (self.response_code & 0x7F);
        data[2] = ((self.filemark as u8) << 7)
            | ((self.eom as u8) << 6)
            | ((self.ili as u8) << 5)
            | (self.sense_key & 0x0F);
        data[3..7].copy_from_slice(&self.information.to_be_bytes());
        data[7] = self.additional_len;
        data[8..12].copy_from_slice(&self.cmd_specific.to_be_bytes());
        data[12] = self.asc;
        data[13] = self.ascq;
        data
    }
}

impl fmt::Debug for SenseData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SenseData")
            .field("valid", &self.valid)
            .field(
                "response_code",
                &format_args!("{:#04x}", self.response_code),
            )
            .field("sense_key", &format_args!("{:#x}", self.sense_key))
            .field("information", &self.information)
            .field("asc", &format_args!("{:#04x}", self.asc))
            .field("ascq", &format_args!("{:#04x}", self.ascq))
            .field("description", &asc_ascq_to_str(self.asc, self.ascq))
            .finish()
    }
}

/// Return the SPC-4 description for a given ASC/ASCQ pair.
#[inline]
pub fn asc_ascq_to_str(asc: u8, ascq: u8) -> &'static str {
    hot_table(asc, ascq).unwrap_or("UNSPECIFIED / vendor specific")
}

fn hot_table(asc: u8, ascq: u8) -> Option<&'static str> {
    Some(match (asc, ascq) {
        (0x00, 0x00) => "No additional sense information",
        (0x11, 0x00) => "Medium error – unrecovered read error",
        (0x0C, 0x00) => "Medium error – write error",
        (0x20, 0x00) => "Illegal request – invalid command operation code",
        (0x21, 0x00) => "Illegal request – logical block address out of range",
        (0x24, 0x00) => "Illegal request – invalid field in CDB",
        (0x25, 0x00) => "Illegal request – logical unit not supported",
        (0x26, 0x00) => "Illegal request – invalid field in parameter list",
        (0x44, 0x00) => "Hardware error – internal target failure",
        (0x4E, 0x00) => "Aborted command – overlapped commands attempted",
        _ => return None,
    })
}
