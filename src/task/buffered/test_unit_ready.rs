// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{
    task::{
        buffered::{ScsiTask, complete},
        common::{TaskContext, TaskError},
    },
    utils::BoxFuture,
};

/// TEST UNIT READY. The in-memory medium is always ready.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TestUnitReadyTask;

impl ScsiTask for TestUnitReadyTask {
    fn execute<'a>(&'a self, ctx: &'a TaskContext<'a>) -> BoxFuture<'a, Result<(), TaskError>> {
        Box::pin(complete(ctx, None))
    }

    fn name(&self) -> &'static str {
        "TEST UNIT READY"
    }
}
