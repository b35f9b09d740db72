//! This crate provides the command-execution and data-transfer core of an
//! iSCSI/SCSI target.
// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Handles configuration, config path resolution, and logging.
pub mod cfg;
/// Connection-scoped settings and the outbound/inbound PDU queues.
pub mod connection;
/// Implements the binary codec of the supported SCSI CDBs.
pub mod control_block;
/// Defines the data structures for iSCSI PDUs and SCSI status/sense data.
pub mod models;
/// Nexus identity, commands, sense exceptions, and the shared resources a
/// task executes against.
pub mod scsi;
/// Contains the write-burst state machine and its data segment iterator.
pub mod state_machine;
/// Task lifecycle, dispatch, task sets, and logical unit task management.
pub mod task;
/// Provides utility types used throughout the crate.
pub mod utils;
