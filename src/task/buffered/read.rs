// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use tracing::trace;

use crate::{
    task::{
        buffered::{ScsiTask, block_range, complete, misrouted},
        common::{TaskContext, TaskError},
    },
    utils::BoxFuture,
};

/// READ(6/10/12/16).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReadTask;

impl ScsiTask for ReadTask {
    fn execute<'a>(&'a self, ctx: &'a TaskContext<'a>) -> BoxFuture<'a, Result<(), TaskError>> {
        Box::pin(async move {
            let (lba, blocks) = ctx.command.cdb.block_transfer().ok_or_else(misrouted)?;
            let (offset, len) = block_range(ctx.resources, lba, blocks)?;
            trace!("READ lba={lba} blocks={blocks} -> {len} bytes @ {offset}");

            let data = ctx.resources.store.read(offset, len)?;
            complete(ctx, Some(data)).await
        })
    }

    fn name(&self) -> &'static str {
        "READ"
    }
}
