// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    models::command::common::ScsiStatus,
    scsi::{
        command::Command,
        nexus::Nexus,
        port::{PortError, TargetTransportPort},
        registry::{InquiryDataRegistry, ModePageRegistry},
        sense::SenseException,
        store::{BackingStore, StoreError},
    },
    task::{
        buffered::{BufferedTask, ScsiTask},
        task_set::TaskSetError,
    },
};

/// Lifecycle of a task.
///
/// ```text
/// Created ─▶ Queued ─▶ Executing ─┬─▶ Completed
///    │          │          │      └─▶ Failed
///    └──────────┴──────────┴─▶ Aborting ─▶ Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Created,
    Queued,
    Executing,
    Aborting,
    Aborted,
    Completed,
    Failed,
}

impl TaskState {
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Aborted | Self::Completed | Self::Failed)
    }
}

/// Everything a task executes against, shared by every task of one logical
/// unit.
pub struct TaskResources {
    pub store: Arc<dyn BackingStore>,
    pub block_length: u32,
    pub mode_pages: Arc<ModePageRegistry>,
    pub inquiry: Arc<InquiryDataRegistry>,
}

impl TaskResources {
    /// Number of whole logical blocks in the store.
    #[inline]
    pub fn block_count(&self) -> u64 {
        self.store.capacity() / self.block_length as u64
    }
}

impl std::fmt::Debug for TaskResources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskResources")
            .field("capacity", &self.store.capacity())
            .field("block_length", &self.block_length)
            .finish_non_exhaustive()
    }
}

/// Borrowed view handed to [`ScsiTask::execute`].
pub struct TaskContext<'a> {
    pub resources: &'a TaskResources,
    pub port: &'a dyn TargetTransportPort,
    pub command: &'a Command,
    pub cancel: &'a CancellationToken,
}

impl TaskContext<'_> {
    #[inline]
    pub fn nexus(&self) -> &Nexus {
        &self.command.nexus
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error(transparent)]
    Sense(#[from] SenseException),
    #[error(transparent)]
    Port(#[from] PortError),
}

impl From<StoreError> for TaskError {
    fn from(e: StoreError) -> Self {
        Self::Sense(e.into())
    }
}

/// One command bound to the task type that executes it.
pub struct Task {
    command: Command,
    port: Arc<dyn TargetTransportPort>,
    kind: BufferedTask,
    resources: Arc<TaskResources>,
    state: watch::Sender<TaskState>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("nexus", &self.command.nexus)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .finish()
    }
}

impl Task {
    pub fn new(
        command: Command,
        port: Arc<dyn TargetTransportPort>,
        kind: BufferedTask,
        resources: Arc<TaskResources>,
    ) -> Self {
        let (state, _) = watch::channel(TaskState::Created);
        Self {
            command,
            port,
            kind,
            resources,
            state,
            cancel: CancellationToken::new(),
        }
    }

    #[inline]
    pub fn nexus(&self) -> &Nexus {
        &self.command.nexus
    }

    #[inline]
    pub fn command(&self) -> &Command {
        &self.command
    }

    #[inline]
    pub fn kind(&self) -> &BufferedTask {
        &self.kind
    }

    #[inline]
    pub fn state(&self) -> TaskState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskState> {
        self.state.subscribe()
    }

    /// Created -> Queued. Returns `false` if the task already moved on.
    pub(crate) fn mark_queued(&self) -> bool {
        self.state.send_if_modified(|s| {
            if *s == TaskState::Created {
                *s = TaskState::Queued;
                true
            } else {
                false
            }
        })
    }

    /// Executes the task to a terminal state and reports the outcome to the
    /// port. A sense exception becomes CHECK CONDITION with sense data; an
    /// abort suppresses any response.
    pub async fn run(&self) -> TaskState {
        let started = self.state.send_if_modified(|s| match s {
            TaskState::Created | TaskState::Queued => {
                *s = TaskState::Executing;
                true
            },
            _ => false,
        });
        if !started {
            debug!("{}: not started, state {:?}", self.nexus(), self.state());
            return self.state();
        }

        let ctx = TaskContext {
            resources: &self.resources,
            port: self.port.as_ref(),
            command: &self.command,
            cancel: &self.cancel,
        };

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            res = self.kind.execute(&ctx) => Some(res),
        };

        let end = match outcome {
            None => TaskState::Aborted,
            Some(Ok(())) => TaskState::Completed,
            Some(Err(TaskError::Sense(sense))) => {
                debug!("{}: {sense}", self.nexus());
                let bytes = Bytes::from(sense.to_bytes());
                if let Err(e) = self
                    .port
                    .write_response(self.nexus(), ScsiStatus::CheckCondition, Some(bytes))
                    .await
                {
                    warn!("{}: failed to deliver CHECK CONDITION: {e}", self.nexus());
                }
                TaskState::Failed
            },
            Some(Err(TaskError::Port(e))) => {
                warn!("{}: transport error: {e}", self.nexus());
                TaskState::Failed
            },
        };

        self.state.send_replace(end);
        debug!("{} [{}] -> {end:?}", self.nexus(), self.kind.name());
        end
    }

    /// Flags the task for abort without waiting. Returns `true` if this call
    /// moved it out of a live state.
    pub(crate) fn request_abort(&self) -> bool {
        let moved = self.state.send_if_modified(|s| match s {
            TaskState::Created | TaskState::Queued => {
                *s = TaskState::Aborted;
                true
            },
            TaskState::Executing => {
                *s = TaskState::Aborting;
                true
            },
            _ => false,
        });
        self.cancel.cancel();
        moved
    }

    /// Waits for a terminal state; `interrupt` cancels the wait, not the
    /// abort.
    pub(crate) async fn wait_terminal(
        &self,
        interrupt: &CancellationToken,
    ) -> Result<TaskState, TaskSetError> {
        let mut rx = self.state.subscribe();
        let done = async move {
            rx.wait_for(TaskState::is_terminal)
                .await
                .map(|s| *s)
                .unwrap_or(TaskState::Aborted)
        };
        tokio::select! {
            biased;
            _ = interrupt.cancelled() => Err(TaskSetError::Interrupted),
            st = done => Ok(st),
        }
    }

    /// Aborts the task and waits until it acknowledges. Returns `true` when
    /// the task ended up aborted, `false` if it had already finished.
    pub async fn abort(&self, interrupt: &CancellationToken) -> Result<bool, TaskSetError> {
        self.request_abort();
        let st = self.wait_terminal(interrupt).await?;
        Ok(st == TaskState::Aborted)
    }
}
