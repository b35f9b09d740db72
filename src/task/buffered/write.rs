// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::BytesMut;
use tracing::trace;

use crate::{
    task::{
        buffered::{ScsiTask, block_range, complete, misrouted, read_exact},
        common::{TaskContext, TaskError},
    },
    utils::BoxFuture,
};

/// WRITE(6/10/12/16). Immediate data from the command PDU is used first, the
/// remainder is solicited from the port.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteTask;

impl ScsiTask for WriteTask {
    fn execute<'a>(&'a self, ctx: &'a TaskContext<'a>) -> BoxFuture<'a, Result<(), TaskError>> {
        Box::pin(async move {
            if !ctx.command.cdb.is_write() {
                return Err(misrouted());
            }
            let (lba, blocks) = ctx.command.cdb.block_transfer().ok_or_else(misrouted)?;
            let (offset, len) = block_range(ctx.resources, lba, blocks)?;

            let mut buf = BytesMut::with_capacity(len);
            if let Some(imm) = &ctx.command.out_of_band {
                buf.extend_from_slice(&imm[..imm.len().min(len)]);
            }
            let immediate = buf.len();
            if immediate < len {
                let rest = read_exact(ctx, len - immediate).await?;
                buf.extend_from_slice(&rest);
            }
            trace!(
                "WRITE lba={lba} blocks={blocks}: {immediate} immediate + {} solicited",
                len - immediate
            );

            ctx.resources.store.write(offset, &buf)?;
            complete(ctx, None).await
        })
    }

    fn name(&self) -> &'static str {
        "WRITE"
    }
}
