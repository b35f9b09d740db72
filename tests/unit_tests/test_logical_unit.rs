// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use hex_literal::hex;
use iscsi_target_core::{
    cfg::{config::TaskSetConfig, enums::TaskSetPolicy},
    control_block::{
        Cdb, read::Read10, read_capacity::ReadCapacity10, request_sense::RequestSense,
        write::Write10,
    },
    models::command::common::ScsiStatus,
    scsi::{command::Command, nexus::Nexus},
    task::{logical_unit::LogicalUnit, task_set::TaskSetError},
};
use tokio_util::sync::CancellationToken;

use crate::unit_tests::common::{
    INITIATOR, MockPort, PortEvent, TARGET_PORT, drain, good, itlq, load_config, next_event,
    resources, sense_of,
};

const OTHER_INITIATOR: &str = "iqn.2025-01.io.example:host-b";

fn unit(capacity: usize, workers: usize, policy: TaskSetPolicy) -> LogicalUnit {
    LogicalUnit::new(
        0,
        TaskSetConfig {
            capacity,
            workers,
            policy,
        },
        resources(64, 512),
    )
}

fn stalled_write(nexus: Nexus) -> Command {
    Command::new(nexus, Cdb::Write10(Write10::new(0, 1)))
}

/// Lets the workers pick up what was just admitted.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test]
async fn test_write_then_read_through_workers() -> Result<()> {
    let cfg = load_config()?;
    let lu = LogicalUnit::from_config(&cfg)?;
    assert_eq!(lu.lun(), 1);

    let data = Bytes::from(vec![0x5Au8; 1024]);
    let (port, mut events) = MockPort::new();
    let write = Command::new(itlq(1, 1), Cdb::Write10(Write10::new(10, 2)))
        .with_out_of_band(data.clone());
    lu.execute_command(port.clone(), write).await?;
    assert_eq!(next_event(&mut events).await?, (itlq(1, 1), good()));

    let read = Command::new(itlq(1, 2), Cdb::Read10(Read10::new(10, 2)));
    lu.execute_command(port.clone(), read).await?;
    assert_eq!(
        next_event(&mut events).await?,
        (itlq(1, 2), PortEvent::DataIn(data))
    );
    assert_eq!(next_event(&mut events).await?, (itlq(1, 2), good()));

    let rc = Command::new(itlq(1, 3), Cdb::ReadCapacity10(ReadCapacity10::default()));
    lu.execute_command(port, rc).await?;
    assert_eq!(
        next_event(&mut events).await?.1,
        PortEvent::DataIn(Bytes::from_static(&hex!("00 00 08 00 00 00 02 00")))
    );

    lu.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_wrong_lun_is_rejected_before_dispatch() -> Result<()> {
    let lu = unit(4, 1, TaskSetPolicy::Shared);
    let (port, mut events) = MockPort::new();

    lu.execute_command(port, Command::new(itlq(7, 1), Cdb::Read10(Read10::new(0, 1))))
        .await?;
    let evs = drain(&mut events);
    assert_eq!(evs.len(), 1);
    assert_eq!(sense_of(&evs[0])?, (0x05, 0x25, 0x00));
    Ok(())
}

#[tokio::test]
async fn test_unregistered_cdb_is_rejected() -> Result<()> {
    let lu = unit(4, 1, TaskSetPolicy::Shared);
    let (port, mut events) = MockPort::new();

    let cmd = Command::new(itlq(0, 1), Cdb::RequestSense(RequestSense::simple(18)));
    lu.execute_command(port, cmd).await?;
    assert_eq!(sense_of(&drain(&mut events)[0])?, (0x05, 0x20, 0x00));
    Ok(())
}

#[tokio::test]
async fn test_abort_task_of_executing_write() -> Result<()> {
    let lu = unit(4, 1, TaskSetPolicy::Shared);
    let (port, mut events) = MockPort::stalled();
    let interrupt = CancellationToken::new();

    lu.execute_command(port, stalled_write(itlq(0, 1))).await?;
    settle().await;

    assert!(lu.abort_task(&itlq(0, 1), &interrupt).await?);
    assert!(!lu.task_set(&itlq(0, 1))?.contains(&itlq(0, 1)).await);

    assert_eq!(
        lu.abort_task(&itlq(0, 1), &interrupt).await,
        Err(TaskSetError::NoSuchElement(itlq(0, 1)))
    );
    settle().await;
    assert!(drain(&mut events).is_empty(), "aborted task sends no status");

    lu.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_overlapped_tag() -> Result<()> {
    let lu = unit(4, 1, TaskSetPolicy::Shared);
    let (stalled, _stalled_events) = MockPort::stalled();
    let (port, mut events) = MockPort::new();

    lu.execute_command(stalled, stalled_write(itlq(0, 1))).await?;
    lu.execute_command(port, stalled_write(itlq(0, 1))).await?;
    assert_eq!(sense_of(&drain(&mut events)[0])?, (0x0B, 0x4E, 0x00));

    lu.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_task_set_full() -> Result<()> {
    let lu = unit(1, 1, TaskSetPolicy::Shared);
    let (stalled, _stalled_events) = MockPort::stalled();
    let (port, mut events) = MockPort::new();

    lu.execute_command(stalled, stalled_write(itlq(0, 1))).await?;
    settle().await;
    lu.execute_command(port, stalled_write(itlq(0, 2))).await?;

    assert_eq!(
        drain(&mut events),
        vec![PortEvent::Response {
            status: ScsiStatus::TaskSetFull,
            sense: None,
        }]
    );

    lu.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_clear_task_set_shared_across_initiators() -> Result<()> {
    let lu = unit(8, 2, TaskSetPolicy::Shared);
    let (port, _events) = MockPort::stalled();
    let interrupt = CancellationToken::new();

    lu.execute_command(port.clone(), stalled_write(itlq(0, 1)))
        .await?;
    lu.execute_command(
        port.clone(),
        stalled_write(Nexus::i_t_l_q(OTHER_INITIATOR, TARGET_PORT, 0, 1)),
    )
    .await?;
    lu.execute_command(port, stalled_write(itlq(0, 2))).await?;
    settle().await;

    let itl = Nexus::i_t_l(INITIATOR, TARGET_PORT, 0);
    assert_eq!(lu.abort_task_set(&itl, &interrupt).await?, 2);
    assert_eq!(lu.clear_task_set(&itl, &interrupt).await?, 1);
    assert!(lu.task_set(&itl)?.is_empty().await);

    lu.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_clear_task_set_per_initiator() -> Result<()> {
    let lu = unit(8, 2, TaskSetPolicy::PerInitiator);
    let (port, _events) = MockPort::stalled();
    let interrupt = CancellationToken::new();
    let other = Nexus::i_t_l_q(OTHER_INITIATOR, TARGET_PORT, 0, 1);

    lu.execute_command(port.clone(), stalled_write(itlq(0, 1)))
        .await?;
    lu.execute_command(port, stalled_write(other.clone())).await?;
    settle().await;

    let itl = Nexus::i_t_l(INITIATOR, TARGET_PORT, 0);
    assert_eq!(lu.clear_task_set(&itl, &interrupt).await?, 1);
    assert!(lu.task_set(&other)?.contains(&other).await);

    // no task set exists yet for a third initiator
    let stranger = Nexus::i_t_l("iqn.2025-01.io.example:host-c", TARGET_PORT, 0);
    assert_eq!(lu.clear_task_set(&stranger, &interrupt).await?, 0);

    tokio::time::timeout(Duration::from_secs(5), lu.shutdown()).await?;
    Ok(())
}
