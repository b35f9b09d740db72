// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// A decoded command bound to its nexus.
pub mod command;
/// I / I_T / I_T_L / I_T_L_Q identity.
pub mod nexus;
/// Transport endpoint tasks send data and status through.
pub mod port;
/// Mode-page and inquiry lookups.
pub mod registry;
/// Sense exceptions and their sense-data rendering.
pub mod sense;
/// Backing store contract and the in-memory implementation.
pub mod store;
