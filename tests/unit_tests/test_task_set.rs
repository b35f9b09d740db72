// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use iscsi_target_core::{
    control_block::{Cdb, test_unit_ready::TestUnitReady},
    scsi::{
        command::Command,
        nexus::{Nexus, NexusLevel},
    },
    task::{
        common::{Task, TaskState},
        factory::TaskFactory,
        task_set::{TaskSet, TaskSetError},
    },
};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::unit_tests::common::{INITIATOR, MockPort, TARGET_PORT, itlq, resources};

const OTHER_INITIATOR: &str = "iqn.2025-01.io.example:host-b";

fn task(nexus: Nexus) -> Arc<Task> {
    let (port, _events) = MockPort::new();
    let cmd = Command::new(nexus, Cdb::TestUnitReady(TestUnitReady::default()));
    Arc::new(
        TaskFactory::new(resources(1, 512))
            .get_instance(port, cmd)
            .expect("TEST UNIT READY is registered"),
    )
}

#[tokio::test]
async fn test_fifo_and_index_lifetime() -> Result<()> {
    let set = TaskSet::new(4);
    let (t1, t2) = (task(itlq(0, 1)), task(itlq(0, 2)));
    set.offer(t1.clone()).await?;
    set.offer(t2.clone()).await?;
    assert_eq!(t1.state(), TaskState::Queued);

    let first = set.poll().await.expect("t1 queued");
    assert!(Arc::ptr_eq(&first, &t1));
    let second = set.poll().await.expect("t2 queued");
    assert!(Arc::ptr_eq(&second, &t2));
    assert!(set.poll().await.is_none());

    // taken tasks stay indexed until finished
    assert_eq!(set.len().await, 2);
    assert!(set.contains(&itlq(0, 1)).await);
    assert!(set.finish(&t1).await);
    assert!(!set.finish(&t1).await);
    assert_eq!(set.len().await, 1);
    Ok(())
}

#[tokio::test]
async fn test_admission_errors() -> Result<()> {
    let set = TaskSet::new(2);
    set.offer(task(itlq(0, 1))).await?;

    assert_eq!(
        set.offer(task(itlq(0, 1))).await,
        Err(TaskSetError::Overlapped(itlq(0, 1)))
    );

    set.offer(task(itlq(0, 2))).await?;
    assert_eq!(
        set.offer(task(itlq(0, 3))).await,
        Err(TaskSetError::Full { capacity: 2 })
    );

    let untagged = task(Nexus::i_t_l(INITIATOR, TARGET_PORT, 0));
    assert_eq!(
        TaskSet::new(2).offer(untagged).await,
        Err(TaskSetError::IllegalArgument {
            expected: NexusLevel::ITLQ,
            found: NexusLevel::ITL,
        })
    );
    assert_eq!(set.len().await, 2);
    Ok(())
}

#[tokio::test]
async fn test_remove() -> Result<()> {
    let set = TaskSet::new(4);
    let interrupt = CancellationToken::new();
    let t1 = task(itlq(0, 1));
    set.offer(t1.clone()).await?;

    assert_eq!(
        set.remove(&itlq(0, 9), &interrupt).await,
        Err(TaskSetError::NoSuchElement(itlq(0, 9)))
    );
    assert_eq!(set.len().await, 1);

    assert_eq!(
        set.remove(&Nexus::i_t_l(INITIATOR, TARGET_PORT, 0), &interrupt)
            .await,
        Err(TaskSetError::IllegalArgument {
            expected: NexusLevel::ITLQ,
            found: NexusLevel::ITL,
        })
    );

    assert!(set.remove(&itlq(0, 1), &interrupt).await?);
    assert_eq!(t1.state(), TaskState::Aborted);
    assert!(set.is_empty().await);
    assert!(set.poll().await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_clear_sweeps_logical_unit_across_initiators() -> Result<()> {
    let set = TaskSet::new(8);
    let interrupt = CancellationToken::new();
    let a = task(itlq(0, 1));
    let b = task(Nexus::i_t_l_q(OTHER_INITIATOR, TARGET_PORT, 0, 1));
    let other_lun = task(itlq(1, 1));
    for t in [&a, &b, &other_lun] {
        set.offer(t.clone()).await?;
    }

    let swept = set
        .clear(&Nexus::i_t_l(INITIATOR, TARGET_PORT, 0), &interrupt)
        .await?;
    assert_eq!(swept, 2);
    assert_eq!(a.state(), TaskState::Aborted);
    assert_eq!(b.state(), TaskState::Aborted);
    assert_eq!(other_lun.state(), TaskState::Queued);
    assert_eq!(set.len().await, 1);

    let next = set.poll().await.expect("other LUN still queued");
    assert!(Arc::ptr_eq(&next, &other_lun));

    assert_eq!(
        set.clear(&itlq(0, 1), &interrupt).await,
        Err(TaskSetError::IllegalArgument {
            expected: NexusLevel::ITL,
            found: NexusLevel::ITLQ,
        })
    );
    Ok(())
}

#[tokio::test]
async fn test_abort_stays_within_i_t_l() -> Result<()> {
    let set = TaskSet::new(8);
    let interrupt = CancellationToken::new();
    let a1 = task(itlq(0, 1));
    let a2 = task(itlq(0, 2));
    let b = task(Nexus::i_t_l_q(OTHER_INITIATOR, TARGET_PORT, 0, 1));
    for t in [&a1, &a2, &b] {
        set.offer(t.clone()).await?;
    }

    let aborted = set
        .abort(&Nexus::i_t_l(INITIATOR, TARGET_PORT, 0), &interrupt)
        .await?;
    assert_eq!(aborted, 2);
    assert_eq!(b.state(), TaskState::Queued);
    assert!(
        set.contains(&Nexus::i_t_l_q(OTHER_INITIATOR, TARGET_PORT, 0, 1))
            .await
    );

    // nothing left to match
    assert_eq!(
        set.abort(&Nexus::i_t_l(INITIATOR, TARGET_PORT, 0), &interrupt)
            .await?,
        0
    );
    Ok(())
}

#[tokio::test]
async fn test_put_waits_for_room() -> Result<()> {
    let set = Arc::new(TaskSet::new(1));
    let t1 = task(itlq(0, 1));
    set.offer(t1.clone()).await?;

    let waiter = {
        let set = set.clone();
        tokio::spawn(async move {
            let interrupt = CancellationToken::new();
            set.put(task(itlq(0, 2)), &interrupt).await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());
    assert!(!set.contains(&itlq(0, 2)).await);

    assert!(set.finish(&t1).await);
    tokio::time::timeout(Duration::from_secs(5), waiter).await???;
    assert!(set.contains(&itlq(0, 2)).await);
    assert_eq!(set.len().await, 1);
    Ok(())
}

#[tokio::test]
async fn test_take_waits_and_can_be_interrupted() -> Result<()> {
    let set = Arc::new(TaskSet::new(2));

    let interrupt = CancellationToken::new();
    interrupt.cancel();
    assert_eq!(
        set.take(&interrupt).await.map(|_| ()),
        Err(TaskSetError::Interrupted)
    );

    let taker = {
        let set = set.clone();
        tokio::spawn(async move { set.take(&CancellationToken::new()).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let t1 = task(itlq(0, 1));
    set.offer(t1.clone()).await?;

    let taken = tokio::time::timeout(Duration::from_secs(5), taker).await???;
    assert!(Arc::ptr_eq(&taken, &t1));
    Ok(())
}

#[tokio::test]
async fn test_clear_all() -> Result<()> {
    let set = TaskSet::new(4);
    for tag in 1..=3 {
        set.offer(task(itlq(0, tag))).await?;
    }
    assert_eq!(set.clear_all(&CancellationToken::new()).await?, 3);
    assert!(set.is_empty().await);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_put_of_one_nexus_admits_once() -> Result<()> {
    let set = Arc::new(TaskSet::new(4));
    let mut puts = JoinSet::new();
    for _ in 0..8 {
        let set = set.clone();
        puts.spawn(async move {
            let interrupt = CancellationToken::new();
            set.put(task(itlq(0, 7)), &interrupt).await
        });
    }

    let (mut admitted, mut overlapped) = (0, 0);
    while let Some(res) = puts.join_next().await {
        match res? {
            Ok(()) => admitted += 1,
            Err(TaskSetError::Overlapped(n)) => {
                assert_eq!(n, itlq(0, 7));
                overlapped += 1;
            },
            Err(e) => panic!("unexpected {e}"),
        }
    }
    assert_eq!((admitted, overlapped), (1, 7));
    assert_eq!(set.len().await, 1);
    Ok(())
}

#[tokio::test]
async fn test_interrupted_clear_still_empties_matched_tasks() -> Result<()> {
    let set = TaskSet::new(8);
    let a = task(itlq(0, 1));
    let b = task(Nexus::i_t_l_q(OTHER_INITIATOR, TARGET_PORT, 0, 2));
    let other_lun = task(itlq(1, 1));
    for t in [&a, &b, &other_lun] {
        set.offer(t.clone()).await?;
    }

    let interrupt = CancellationToken::new();
    interrupt.cancel();
    assert_eq!(
        set.clear(&Nexus::i_t_l(INITIATOR, TARGET_PORT, 0), &interrupt)
            .await,
        Err(TaskSetError::Interrupted)
    );

    // every matched task was flagged and dropped before the wait gave up
    assert_eq!(a.state(), TaskState::Aborted);
    assert_eq!(b.state(), TaskState::Aborted);
    assert!(!set.contains(&itlq(0, 1)).await);
    assert_eq!(other_lun.state(), TaskState::Queued);
    assert!(set.contains(&itlq(1, 1)).await);
    assert_eq!(set.len().await, 1);

    let next = set.poll().await.expect("other LUN still queued");
    assert!(Arc::ptr_eq(&next, &other_lun));
    Ok(())
}
