// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Bytes;
use tracing::debug;
use zerocopy::IntoBytes;

use crate::{
    control_block::{
        Cdb,
        read_capacity::{Rc10Raw, Rc16Raw},
    },
    task::{
        buffered::{ScsiTask, complete, misrouted, truncate},
        common::{TaskContext, TaskError},
    },
    utils::BoxFuture,
};

/// READ CAPACITY(10): block count capped to 32 bits, then the block length.
/// PMI is ignored; the store has no seek-time asymmetry to report.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReadCapacity10Task;

impl ScsiTask for ReadCapacity10Task {
    fn execute<'a>(&'a self, ctx: &'a TaskContext<'a>) -> BoxFuture<'a, Result<(), TaskError>> {
        Box::pin(async move {
            let Cdb::ReadCapacity10(cdb) = &ctx.command.cdb else {
                return Err(misrouted());
            };
            if cdb.pmi {
                debug!("READ CAPACITY(10): PMI set, ignored");
            }
            let res = ctx.resources;
            let raw = Rc10Raw::new(res.block_count(), res.block_length);
            complete(ctx, Some(Bytes::copy_from_slice(raw.as_bytes()))).await
        })
    }

    fn name(&self) -> &'static str {
        "READ CAPACITY(10)"
    }
}

/// READ CAPACITY(16): full 64-bit block count in 32 bytes of parameter data.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReadCapacity16Task;

impl ScsiTask for ReadCapacity16Task {
    fn execute<'a>(&'a self, ctx: &'a TaskContext<'a>) -> BoxFuture<'a, Result<(), TaskError>> {
        Box::pin(async move {
            let Cdb::ReadCapacity16(cdb) = &ctx.command.cdb else {
                return Err(misrouted());
            };
            let res = ctx.resources;
            let raw = Rc16Raw::new(res.block_count(), res.block_length);
            let data = truncate(
                Bytes::copy_from_slice(raw.as_bytes()),
                cdb.allocation_length as usize,
            );
            complete(ctx, Some(data)).await
        })
    }

    fn name(&self) -> &'static str {
        "READ CAPACITY(16)"
    }
}
