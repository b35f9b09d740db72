// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! iSCSI PDU model used on the write data path.

/// SCSI status and response codes.
pub mod command;
/// BHS traits shared by every PDU.
pub mod common;
/// Data-Out PDUs and sense data.
pub mod data;
/// Generic PDU container with digests.
pub mod data_fromat;
/// BHS opcode byte.
pub mod opcode;
/// Ready To Transfer (R2T) PDUs.
pub mod ready_2_transfer;
