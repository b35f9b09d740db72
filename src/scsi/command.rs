// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;

use crate::{control_block::Cdb, scsi::nexus::Nexus};

/// A decoded command as it arrives at the logical unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// I_T_L_Q nexus of the command.
    pub nexus: Nexus,
    pub cdb: Cdb,
    /// Immediate data carried inside the command PDU.
    pub out_of_band: Option<Bytes>,
}

impl Command {
    pub fn new(nexus: Nexus, cdb: Cdb) -> Self {
        Self {
            nexus,
            cdb,
            out_of_band: None,
        }
    }

    pub fn with_out_of_band(mut self, data: Bytes) -> Self {
        self.out_of_band = Some(data);
        self
    }
}
