// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

/// Task types that transfer their data through a single buffer.
pub mod buffered;
/// Task, task state, execution context and resources.
pub mod common;
/// CDB variant to task type dispatch.
pub mod factory;
/// Logical unit: task-set partitioning, workers, task management.
pub mod logical_unit;
/// Bounded nexus-indexed task queue.
pub mod task_set;
