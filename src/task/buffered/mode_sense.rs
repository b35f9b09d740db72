// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    control_block::{Cdb, common::PageControl, mod_sense::ALL_PAGES},
    scsi::{registry::ModePageRegistry, sense::SenseException},
    task::{
        buffered::{ScsiTask, complete, misrouted, truncate},
        common::{TaskContext, TaskError},
    },
    utils::BoxFuture,
};

/// MODE SENSE(6/10) over the mode-page registry. No block descriptors are
/// returned.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ModeSenseTask;

/// Requested pages concatenated. Changeable values are all zero: nothing in
/// the registry can be changed.
fn collect_pages(
    registry: &ModePageRegistry,
    page_code: u8,
    subpage_code: u8,
    pc: PageControl,
) -> Result<BytesMut, SenseException> {
    if subpage_code != 0 {
        return Err(SenseException::invalid_field_in_cdb());
    }
    let mut out = BytesMut::new();
    let mut push = |page: &Bytes| match pc {
        PageControl::Changeable => {
            out.put_slice(&page[..2.min(page.len())]);
            out.put_bytes(0, page.len().saturating_sub(2));
        },
        _ => out.put_slice(page),
    };

    if page_code == ALL_PAGES {
        registry.pages().for_each(&mut push);
    } else {
        let page = registry
            .get(page_code)
            .ok_or_else(SenseException::invalid_field_in_cdb)?;
        push(page);
    }
    Ok(out)
}

impl ScsiTask for ModeSenseTask {
    fn execute<'a>(&'a self, ctx: &'a TaskContext<'a>) -> BoxFuture<'a, Result<(), TaskError>> {
        Box::pin(async move {
            let registry = &ctx.resources.mode_pages;
            let data = match &ctx.command.cdb {
                Cdb::ModeSense6(c) => {
                    let pages = collect_pages(
                        registry,
                        c.page_code.get(),
                        c.subpage_code,
                        c.page_control,
                    )?;
                    let mut out = BytesMut::with_capacity(4 + pages.len());
                    // MODE DATA LENGTH excludes itself
                    out.put_u8((3 + pages.len()).min(u8::MAX as usize) as u8);
                    out.put_u8(0); // medium type
                    out.put_u8(0); // device-specific parameter
                    out.put_u8(0); // block descriptor length
                    out.put_slice(&pages);
                    truncate(out.freeze(), c.allocation_length as usize)
                },
                Cdb::ModeSense10(c) => {
                    let pages = collect_pages(
                        registry,
                        c.page_code.get(),
                        c.subpage_code,
                        c.page_control,
                    )?;
                    let mut out = BytesMut::with_capacity(8 + pages.len());
                    out.put_u16((6 + pages.len()).min(u16::MAX as usize) as u16);
                    out.put_u8(0);
                    out.put_u8(0);
                    out.put_u8(0); // LONGLBA = 0
                    out.put_u8(0);
                    out.put_u16(0);
                    out.put_slice(&pages);
                    truncate(out.freeze(), c.allocation_length as usize)
                },
                _ => return Err(misrouted()),
            };
            complete(ctx, Some(data)).await
        })
    }

    fn name(&self) -> &'static str {
        "MODE SENSE"
    }
}
