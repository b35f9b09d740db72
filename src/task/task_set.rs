// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Bounded, nexus-indexed collection of tasks.
//!
//! The queue side (`offer`/`poll`/`put`/`take`) and the task-management side
//! (`remove`/`clear`/`abort`) share one index keyed by the I_T_L_Q nexus. A
//! task stays indexed from admission until [`TaskSet::finish`], so at most one
//! task per I_T_L_Q nexus is ever present and a management call that pulls a
//! task out of the index owns it exclusively.

use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    scsi::nexus::{Nexus, NexusLevel},
    task::common::Task,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskSetError {
    #[error("no task with nexus {0}")]
    NoSuchElement(Nexus),
    #[error("expected an {expected} nexus, got {found}")]
    IllegalArgument {
        expected: NexusLevel,
        found: NexusLevel,
    },
    #[error("interrupted while waiting")]
    Interrupted,
    #[error("task set full ({capacity} tasks)")]
    Full { capacity: usize },
    #[error("a task with nexus {0} is already present")]
    Overlapped(Nexus),
}

fn require_level(nexus: &Nexus, expected: NexusLevel) -> Result<(), TaskSetError> {
    let found = nexus.level();
    if found != expected {
        return Err(TaskSetError::IllegalArgument { expected, found });
    }
    Ok(())
}

#[derive(Debug, Default)]
struct Inner {
    /// Admission order of tasks not yet taken.
    pending: VecDeque<Nexus>,
    /// Every queued or executing task.
    index: HashMap<Nexus, Arc<Task>>,
}

impl Inner {
    fn pop_next(&mut self) -> Option<Arc<Task>> {
        while let Some(nexus) = self.pending.pop_front() {
            if let Some(task) = self.index.get(&nexus) {
                return Some(task.clone());
            }
        }
        None
    }

    fn extract(&mut self, mut pred: impl FnMut(&Nexus) -> bool) -> Vec<Arc<Task>> {
        let matched: Vec<Nexus> = self.index.keys().filter(|n| pred(*n)).cloned().collect();
        self.pending.retain(|n| !matched.contains(n));
        matched
            .iter()
            .filter_map(|n| self.index.remove(n))
            .collect()
    }
}

#[derive(Debug)]
pub struct TaskSet {
    capacity: usize,
    inner: Mutex<Inner>,
    not_empty: Notify,
    not_full: Notify,
}

impl TaskSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner::default()),
            not_empty: Notify::new(),
            not_full: Notify::new(),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Queued plus executing tasks.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.index.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn contains(&self, nexus: &Nexus) -> bool {
        self.inner.lock().await.index.contains_key(nexus)
    }

    fn admit(&self, inner: &mut Inner, task: Arc<Task>) -> Result<(), TaskSetError> {
        let nexus = task.nexus().clone();
        require_level(&nexus, NexusLevel::ITLQ)?;
        if inner.index.contains_key(&nexus) {
            return Err(TaskSetError::Overlapped(nexus));
        }
        if inner.index.len() >= self.capacity {
            return Err(TaskSetError::Full {
                capacity: self.capacity,
            });
        }
        task.mark_queued();
        inner.pending.push_back(nexus.clone());
        inner.index.insert(nexus, task);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Admits `task` without waiting; fails with `Full` when at capacity.
    pub async fn offer(&self, task: Arc<Task>) -> Result<(), TaskSetError> {
        let mut inner = self.inner.lock().await;
        self.admit(&mut inner, task)
    }

    /// Admits `task`, waiting for room.
    pub async fn put(
        &self,
        task: Arc<Task>,
        interrupt: &CancellationToken,
    ) -> Result<(), TaskSetError> {
        loop {
            let notified = self.not_full.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut inner = self.inner.lock().await;
                if inner.index.len() < self.capacity {
                    return self.admit(&mut inner, task);
                }
            }
            tokio::select! {
                biased;
                _ = interrupt.cancelled() => return Err(TaskSetError::Interrupted),
                _ = &mut notified => {},
            }
        }
    }

    /// Next queued task, without waiting. The task stays indexed until
    /// [`TaskSet::finish`].
    pub async fn poll(&self) -> Option<Arc<Task>> {
        self.inner.lock().await.pop_next()
    }

    /// Next queued task, waiting for one.
    pub async fn take(&self, interrupt: &CancellationToken) -> Result<Arc<Task>, TaskSetError> {
        loop {
            let notified = self.not_empty.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(task) = self.inner.lock().await.pop_next() {
                return Ok(task);
            }
            tokio::select! {
                biased;
                _ = interrupt.cancelled() => return Err(TaskSetError::Interrupted),
                _ = &mut notified => {},
            }
        }
    }

    /// Drops a task that reached a terminal state from the index. A task
    /// already pulled out by task management is left alone.
    pub async fn finish(&self, task: &Arc<Task>) -> bool {
        let mut inner = self.inner.lock().await;
        let same = inner
            .index
            .get(task.nexus())
            .is_some_and(|t| Arc::ptr_eq(t, task));
        if same {
            inner.index.remove(task.nexus());
            drop(inner);
            self.not_full.notify_one();
        }
        same
    }

    /// ABORT TASK: aborts and removes the task with exactly this I_T_L_Q
    /// nexus. Returns whether the abort took effect.
    pub async fn remove(
        &self,
        nexus: &Nexus,
        interrupt: &CancellationToken,
    ) -> Result<bool, TaskSetError> {
        require_level(nexus, NexusLevel::ITLQ)?;
        let task = {
            let mut inner = self.inner.lock().await;
            let task = inner
                .index
                .remove(nexus)
                .ok_or_else(|| TaskSetError::NoSuchElement(nexus.clone()))?;
            inner.pending.retain(|n| n != nexus);
            task
        };
        self.not_full.notify_one();
        info!("ABORT TASK {nexus}");
        task.abort(interrupt).await
    }

    /// CLEAR TASK SET: every task on the same logical unit as `nexus`,
    /// whatever its initiator. Returns the number of tasks swept.
    pub async fn clear(
        &self,
        nexus: &Nexus,
        interrupt: &CancellationToken,
    ) -> Result<usize, TaskSetError> {
        require_level(nexus, NexusLevel::ITL)?;
        info!("CLEAR TASK SET {nexus}");
        self.sweep(|n| nexus.same_logical_unit(n), interrupt).await
    }

    /// ABORT TASK SET: tasks under this I_T_L nexus only.
    pub async fn abort(
        &self,
        nexus: &Nexus,
        interrupt: &CancellationToken,
    ) -> Result<usize, TaskSetError> {
        require_level(nexus, NexusLevel::ITL)?;
        info!("ABORT TASK SET {nexus}");
        self.sweep(|n| nexus.contains(n), interrupt).await
    }

    /// Aborts every task in the set.
    pub async fn clear_all(&self, interrupt: &CancellationToken) -> Result<usize, TaskSetError> {
        self.sweep(|_| true, interrupt).await
    }

    /// Pulls the matching tasks out of the index, flags all of them, then
    /// waits for each. A task that fails to abort does not stop the sweep;
    /// an interrupt is reported after every matched task was flagged.
    async fn sweep(
        &self,
        pred: impl FnMut(&Nexus) -> bool,
        interrupt: &CancellationToken,
    ) -> Result<usize, TaskSetError> {
        let matched = self.inner.lock().await.extract(pred);
        if matched.is_empty() {
            return Ok(0);
        }
        self.not_full.notify_waiters();

        for task in &matched {
            task.request_abort();
        }

        for task in &matched {
            match task.wait_terminal(interrupt).await {
                Ok(st) => debug!("{} swept, final state {st:?}", task.nexus()),
                Err(e) => {
                    warn!("{}: abort not acknowledged: {e}", task.nexus());
                    return Err(e);
                },
            }
        }
        Ok(matched.len())
    }
}
