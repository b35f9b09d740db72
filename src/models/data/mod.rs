// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! SCSI Data-Out PDUs and the sense data carried by SCSI Responses.

/// Flags byte of the Data-Out PDU.
pub mod common;
/// Data-Out BHS and its builder.
pub mod request;
/// Fixed-format sense data.
pub mod sense_data;
