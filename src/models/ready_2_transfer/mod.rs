// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Ready To Transfer (R2T) BHS and builder.
pub mod response;
