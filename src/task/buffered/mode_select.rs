// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::Buf;
use tracing::debug;

use crate::{
    control_block::Cdb,
    scsi::{registry::ModePageRegistry, sense::SenseException},
    task::{
        buffered::{ScsiTask, complete, misrouted, read_exact},
        common::{TaskContext, TaskError},
    },
    utils::BoxFuture,
};

/// MODE SELECT(6/10). Pages are validated against the registry but not
/// stored: the registry is read-only.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ModeSelectTask;

/// Walks the mode parameter list: header, block descriptors, then pages.
pub(crate) fn validate_parameter_list(
    registry: &ModePageRegistry,
    params: &[u8],
    ten_byte: bool,
) -> Result<usize, SenseException> {
    let bad = SenseException::invalid_field_in_parameter_list;
    let mut buf = params;

    let block_descriptors = if ten_byte {
        if buf.remaining() < 8 {
            return Err(bad());
        }
        buf.advance(6);
        buf.get_u16() as usize
    } else {
        if buf.remaining() < 4 {
            return Err(bad());
        }
        buf.advance(3);
        buf.get_u8() as usize
    };
    if buf.remaining() < block_descriptors {
        return Err(bad());
    }
    buf.advance(block_descriptors);

    let mut pages = 0usize;
    while buf.has_remaining() {
        if buf.remaining() < 2 {
            return Err(bad());
        }
        let code = buf[0] & 0x3F;
        let sub_page_format = buf[0] & 0x40 != 0;
        let total = if sub_page_format {
            if buf.remaining() < 4 {
                return Err(bad());
            }
            4 + u16::from_be_bytes([buf[2], buf[3]]) as usize
        } else {
            2 + buf[1] as usize
        };
        if !registry.contains(code) || buf.remaining() < total {
            return Err(bad());
        }
        buf.advance(total);
        pages += 1;
    }
    Ok(pages)
}

impl ScsiTask for ModeSelectTask {
    fn execute<'a>(&'a self, ctx: &'a TaskContext<'a>) -> BoxFuture<'a, Result<(), TaskError>> {
        Box::pin(async move {
            let (save_pages, len, ten_byte) = match &ctx.command.cdb {
                Cdb::ModeSelect6(c) => (c.save_pages, c.parameter_list_length as usize, false),
                Cdb::ModeSelect10(c) => (c.save_pages, c.parameter_list_length as usize, true),
                _ => return Err(misrouted()),
            };
            if save_pages {
                return Err(SenseException::invalid_field_in_cdb().into());
            }
            if len == 0 {
                return complete(ctx, None).await;
            }

            let params = read_exact(ctx, len).await?;
            let pages = validate_parameter_list(&ctx.resources.mode_pages, &params, ten_byte)?;
            debug!("MODE SELECT: {pages} page(s) accepted, not persisted");
            complete(ctx, None).await
        })
    }

    fn name(&self) -> &'static str {
        "MODE SELECT"
    }
}
