// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{collections::HashMap, sync::Arc};

use once_cell::sync::Lazy;
use tracing::debug;

use crate::{
    control_block::CdbKind,
    scsi::{command::Command, port::TargetTransportPort, sense::SenseException},
    task::{
        buffered::{
            BufferedTask, ScsiTask, inquiry::InquiryTask, mode_select::ModeSelectTask,
            mode_sense::ModeSenseTask, read::ReadTask,
            read_capacity::{ReadCapacity10Task, ReadCapacity16Task},
            test_unit_ready::TestUnitReadyTask, write::WriteTask,
        },
        common::{Task, TaskResources},
    },
};

type Constructor = fn() -> BufferedTask;

/// CDB variant -> task constructor. REQUEST SENSE and REPORT LUNS are served
/// above the logical unit and are absent on purpose.
static DISPATCH: Lazy<HashMap<CdbKind, Constructor>> = Lazy::new(|| {
    let read: Constructor = || ReadTask.into();
    let write: Constructor = || WriteTask.into();
    let mode_sense: Constructor = || ModeSenseTask.into();
    let mode_select: Constructor = || ModeSelectTask.into();
    let read_capacity10: Constructor = || ReadCapacity10Task.into();
    let read_capacity16: Constructor = || ReadCapacity16Task.into();
    let test_unit_ready: Constructor = || TestUnitReadyTask.into();
    let inquiry: Constructor = || InquiryTask.into();

    HashMap::from([
        (CdbKind::Read6, read),
        (CdbKind::Read10, read),
        (CdbKind::Read12, read),
        (CdbKind::Read16, read),
        (CdbKind::Write6, write),
        (CdbKind::Write10, write),
        (CdbKind::Write12, write),
        (CdbKind::Write16, write),
        (CdbKind::ReadCapacity10, read_capacity10),
        (CdbKind::ReadCapacity16, read_capacity16),
        (CdbKind::TestUnitReady, test_unit_ready),
        (CdbKind::Inquiry, inquiry),
        (CdbKind::ModeSense6, mode_sense),
        (CdbKind::ModeSense10, mode_sense),
        (CdbKind::ModeSelect6, mode_select),
        (CdbKind::ModeSelect10, mode_select),
    ])
});

/// Builds tasks for incoming commands against one set of shared resources.
#[derive(Debug, Clone)]
pub struct TaskFactory {
    resources: Arc<TaskResources>,
}

impl TaskFactory {
    pub fn new(resources: Arc<TaskResources>) -> Self {
        Self { resources }
    }

    #[inline]
    pub fn resources(&self) -> &Arc<TaskResources> {
        &self.resources
    }

    /// Whether a task type is registered for `kind`.
    pub fn is_registered(kind: CdbKind) -> bool {
        DISPATCH.contains_key(&kind)
    }

    /// Instantiates the task mapped to the command's CDB, or fails with
    /// ILLEGAL REQUEST / INVALID COMMAND OPERATION CODE.
    pub fn get_instance(
        &self,
        port: Arc<dyn TargetTransportPort>,
        command: Command,
    ) -> Result<Task, SenseException> {
        let kind = command.cdb.kind();
        let Some(ctor) = DISPATCH.get(&kind) else {
            debug!("{}: no task registered for {kind:?}", command.nexus);
            return Err(SenseException::invalid_command_operation_code());
        };
        let task = ctor();
        debug!(
            "{}: {kind:?} -> {}, cdb {}",
            command.nexus,
            task.name(),
            hex::encode(command.cdb.encode())
        );
        Ok(Task::new(command, port, task, self.resources.clone()))
    }
}
