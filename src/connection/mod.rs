// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

#![allow(clippy::module_inception)]
/// Outbound PDU queue and inbound PDU feed of one connection.
pub mod connection;
/// Operational keys and the settings provider.
pub mod settings;
