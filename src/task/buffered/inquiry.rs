// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use crate::{
    control_block::Cdb,
    scsi::sense::SenseException,
    task::{
        buffered::{ScsiTask, complete, misrouted, truncate},
        common::{TaskContext, TaskError},
    },
    utils::BoxFuture,
};

/// INQUIRY: standard data, or a VPD page when EVPD is set.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InquiryTask;

impl ScsiTask for InquiryTask {
    fn execute<'a>(&'a self, ctx: &'a TaskContext<'a>) -> BoxFuture<'a, Result<(), TaskError>> {
        Box::pin(async move {
            let Cdb::Inquiry(cdb) = &ctx.command.cdb else {
                return Err(misrouted());
            };
            let registry = &ctx.resources.inquiry;

            let data = if cdb.evpd {
                registry
                    .vpd(cdb.page_code)
                    .cloned()
                    .ok_or_else(SenseException::invalid_field_in_cdb)?
            } else if cdb.page_code != 0 {
                return Err(SenseException::invalid_field_in_cdb().into());
            } else {
                registry.standard().clone()
            };

            complete(ctx, Some(truncate(data, cdb.allocation_length as usize))).await
        })
    }

    fn name(&self) -> &'static str {
        "INQUIRY"
    }
}
