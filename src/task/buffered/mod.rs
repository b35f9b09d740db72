// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Tasks that move their whole data transfer through one buffer: the data is
//! gathered (or produced) in memory and handed to the port in one piece.

pub mod inquiry;
pub mod mode_select;
pub mod mode_sense;
pub mod read;
pub mod read_capacity;
pub mod test_unit_ready;
pub mod write;

use bytes::Bytes;
use enum_dispatch::enum_dispatch;

use crate::{
    models::command::common::ScsiStatus,
    scsi::{port::PortError, sense::SenseException},
    task::{
        buffered::{
            inquiry::InquiryTask,
            mode_select::ModeSelectTask,
            mode_sense::ModeSenseTask,
            read::ReadTask,
            read_capacity::{ReadCapacity10Task, ReadCapacity16Task},
            test_unit_ready::TestUnitReadyTask,
            write::WriteTask,
        },
        common::{TaskContext, TaskError, TaskResources},
    },
    utils::{BoxFuture, saturate_u32},
};

/// Executable behaviour of one task type.
#[enum_dispatch]
pub trait ScsiTask {
    /// Runs the command to completion. On `Ok` the task has already sent its
    /// data and GOOD status; on `Err` the caller reports the failure.
    fn execute<'a>(&'a self, ctx: &'a TaskContext<'a>) -> BoxFuture<'a, Result<(), TaskError>>;

    fn name(&self) -> &'static str;
}

/// Closed set of task types the dispatch table can produce.
#[enum_dispatch(ScsiTask)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferedTask {
    ReadTask(ReadTask),
    WriteTask(WriteTask),
    ReadCapacity10Task(ReadCapacity10Task),
    ReadCapacity16Task(ReadCapacity16Task),
    TestUnitReadyTask(TestUnitReadyTask),
    InquiryTask(InquiryTask),
    ModeSenseTask(ModeSenseTask),
    ModeSelectTask(ModeSelectTask),
}

/// Sends `data` (if any) then GOOD.
pub(crate) async fn complete(ctx: &TaskContext<'_>, data: Option<Bytes>) -> Result<(), TaskError> {
    if let Some(data) = data.filter(|d| !d.is_empty()) {
        ctx.port.write_data(ctx.nexus(), data).await?;
    }
    ctx.port
        .write_response(ctx.nexus(), ScsiStatus::Good, None)
        .await?;
    Ok(())
}

/// Byte offset and length of `blocks` blocks starting at `lba`, or LBA OUT
/// OF RANGE if the range leaves the medium.
pub(crate) fn block_range(
    res: &TaskResources,
    lba: u64,
    blocks: u32,
) -> Result<(u64, usize), SenseException> {
    let out_of_range = SenseException::lba_out_of_range().with_information(saturate_u32(lba));
    let end = lba.checked_add(blocks as u64).ok_or(out_of_range)?;
    if end > res.block_count() {
        return Err(out_of_range);
    }
    let bl = res.block_length as u64;
    let len = usize::try_from(blocks as u64 * bl).map_err(|_| out_of_range)?;
    Ok((lba * bl, len))
}

/// Pulls exactly `len` bytes of Data-Out from the port.
pub(crate) async fn read_exact(ctx: &TaskContext<'_>, len: usize) -> Result<Bytes, TaskError> {
    let data = ctx.port.read_data(ctx.nexus(), len).await?;
    if data.len() != len {
        return Err(PortError::ShortRead {
            want: len,
            got: data.len(),
        }
        .into());
    }
    Ok(data)
}

/// Truncates parameter data to the CDB's allocation length.
#[inline]
pub(crate) fn truncate(mut data: Bytes, allocation_length: usize) -> Bytes {
    data.truncate(allocation_length);
    data
}

/// The CDB variant does not belong to the task it was routed to.
#[inline]
pub(crate) fn misrouted() -> TaskError {
    SenseException::invalid_command_operation_code().into()
}
