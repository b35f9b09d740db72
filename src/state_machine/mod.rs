//! State machines driving multi-PDU exchanges on a connection.

// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Common structures and traits for state machines.
pub mod common;
/// Chunk producer over a write payload.
pub mod data_segment;
/// Write-burst state machine (unsolicited burst, R2T rounds, response).
pub mod write_states;
