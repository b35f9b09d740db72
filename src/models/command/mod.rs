// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// SCSI status and iSCSI response codes of a SCSI Response.
pub mod common;
