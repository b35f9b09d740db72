// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use iscsi_target_core::{
    control_block::{
        Cdb, CdbKind,
        inquiry::Inquiry,
        mod_sense::ModeSense6,
        mode_select::ModeSelect10,
        read::Read12,
        read_capacity::{ReadCapacity10, ReadCapacity16},
        report_luns::ReportLuns,
        request_sense::RequestSense,
        test_unit_ready::TestUnitReady,
        write::Write16,
    },
    scsi::{command::Command, sense::SenseException},
    task::{
        buffered::{
            BufferedTask, ScsiTask, inquiry::InquiryTask, mode_select::ModeSelectTask,
            mode_sense::ModeSenseTask, read::ReadTask,
            read_capacity::{ReadCapacity10Task, ReadCapacity16Task},
            test_unit_ready::TestUnitReadyTask, write::WriteTask,
        },
        common::TaskState,
        factory::TaskFactory,
    },
};

use crate::unit_tests::common::{MockPort, itlq, resources};

#[test]
fn test_registered_cdbs_map_to_their_task() -> Result<()> {
    let factory = TaskFactory::new(resources(16, 512));
    let (port, _events) = MockPort::new();

    let cases: [(Cdb, BufferedTask); 8] = [
        (Cdb::Read12(Read12::new(0, 1)), ReadTask.into()),
        (Cdb::Write16(Write16::new(0, 1)), WriteTask.into()),
        (
            Cdb::ReadCapacity10(ReadCapacity10::default()),
            ReadCapacity10Task.into(),
        ),
        (
            Cdb::ReadCapacity16(ReadCapacity16::new(32)),
            ReadCapacity16Task.into(),
        ),
        (
            Cdb::TestUnitReady(TestUnitReady::default()),
            TestUnitReadyTask.into(),
        ),
        (Cdb::Inquiry(Inquiry::standard(36)), InquiryTask.into()),
        (Cdb::ModeSense6(ModeSense6::simple(0x3F, 255)), ModeSenseTask.into()),
        (
            Cdb::ModeSelect10(ModeSelect10::new(true, false, 0)),
            ModeSelectTask.into(),
        ),
    ];

    for (tag, (cdb, expected)) in (1u32..).zip(cases) {
        assert!(TaskFactory::is_registered(cdb.kind()));
        let task = factory.get_instance(port.clone(), Command::new(itlq(0, tag), cdb))?;
        assert_eq!(task.kind(), &expected, "{:?}", cdb.kind());
        assert_eq!(task.state(), TaskState::Created);
        assert_eq!(task.nexus(), &itlq(0, tag));
    }
    Ok(())
}

#[test]
fn test_task_names() {
    let read: BufferedTask = ReadTask.into();
    let rc16: BufferedTask = ReadCapacity16Task.into();
    assert_eq!(read.name(), "READ");
    assert_ne!(read.name(), rc16.name());
}

#[test]
fn test_unregistered_cdb_is_invalid_opcode() {
    let factory = TaskFactory::new(resources(16, 512));
    let (port, _events) = MockPort::new();

    assert!(!TaskFactory::is_registered(CdbKind::RequestSense));
    assert!(!TaskFactory::is_registered(CdbKind::ReportLuns));

    for cdb in [
        Cdb::RequestSense(RequestSense::simple(18)),
        Cdb::ReportLuns(ReportLuns::new(0, 16)),
    ] {
        let err = factory
            .get_instance(port.clone(), Command::new(itlq(0, 1), cdb))
            .expect_err("no task for this CDB");
        assert_eq!(err, SenseException::invalid_command_operation_code());
        assert_eq!((err.sense_key, err.asc, err.ascq), (0x05, 0x20, 0x00));
    }
}
