// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;
use thiserror::Error;

use crate::{models::command::common::ScsiStatus, scsi::nexus::Nexus, utils::BoxFuture};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PortError {
    #[error("transport closed")]
    Closed,
    #[error("short data-out: wanted {want} bytes, got {got}")]
    ShortRead { want: usize, got: usize },
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Transport-side endpoint a task talks to: it pulls write data from the
/// initiator, pushes read data back and completes the command with a status.
pub trait TargetTransportPort: Send + Sync {
    /// Solicit `len` bytes of Data-Out for the command identified by `nexus`.
    fn read_data<'a>(
        &'a self,
        nexus: &'a Nexus,
        len: usize,
    ) -> BoxFuture<'a, Result<Bytes, PortError>>;

    /// Send Data-In for the command.
    fn write_data<'a>(
        &'a self,
        nexus: &'a Nexus,
        data: Bytes,
    ) -> BoxFuture<'a, Result<(), PortError>>;

    /// Complete the command. `sense` is present with CHECK CONDITION.
    fn write_response<'a>(
        &'a self,
        nexus: &'a Nexus,
        status: ScsiStatus,
        sense: Option<Bytes>,
    ) -> BoxFuture<'a, Result<(), PortError>>;
}
