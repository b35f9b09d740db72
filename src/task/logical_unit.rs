// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use dashmap::DashMap;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{Instrument, debug, debug_span, info, warn};

use crate::{
    cfg::{
        config::{Config, TaskSetConfig},
        enums::TaskSetPolicy,
    },
    models::command::common::ScsiStatus,
    scsi::{
        command::Command,
        nexus::{Nexus, NexusLevel},
        port::{PortError, TargetTransportPort},
        registry::{InquiryDataRegistry, ModePageRegistry},
        sense::SenseException,
        store::MemoryStore,
    },
    task::{
        buffered::ScsiTask,
        common::{TaskResources, TaskState},
        factory::TaskFactory,
        task_set::{TaskSet, TaskSetError},
    },
};

/// One logical unit: dispatches commands into its task set(s) and runs them
/// on a fixed number of workers per set.
#[derive(Debug)]
pub struct LogicalUnit {
    lun: u64,
    factory: TaskFactory,
    task_set_cfg: TaskSetConfig,
    /// `None` under [`TaskSetPolicy::Shared`], the I_T nexus otherwise.
    task_sets: DashMap<Option<Nexus>, Arc<TaskSet>>,
    tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl LogicalUnit {
    pub fn new(lun: u64, task_set_cfg: TaskSetConfig, resources: Arc<TaskResources>) -> Self {
        Self {
            lun,
            factory: TaskFactory::new(resources),
            task_set_cfg,
            task_sets: DashMap::new(),
            tracker: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Logical unit over a zeroed in-memory store sized from the config.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let lu = &cfg.logical_unit;
        let resources = TaskResources {
            store: Arc::new(MemoryStore::new(cfg.capacity_bytes()?)),
            block_length: lu.block_length,
            mode_pages: Arc::new(ModePageRegistry::default()),
            inquiry: Arc::new(InquiryDataRegistry::from_target(&cfg.target)),
        };
        info!(
            "LUN {}: {} blocks x {} bytes, task sets {} (capacity {}, {} workers)",
            lu.lun,
            lu.block_count,
            lu.block_length,
            lu.task_set.policy,
            lu.task_set.capacity,
            lu.task_set.workers
        );
        Ok(Self::new(lu.lun, lu.task_set.clone(), Arc::new(resources)))
    }

    #[inline]
    pub fn lun(&self) -> u64 {
        self.lun
    }

    #[inline]
    pub fn factory(&self) -> &TaskFactory {
        &self.factory
    }

    fn task_set_key(&self, nexus: &Nexus) -> Result<Option<Nexus>, TaskSetError> {
        match self.task_set_cfg.policy {
            TaskSetPolicy::Shared => Ok(None),
            TaskSetPolicy::PerInitiator => {
                nexus
                    .i_t_prefix()
                    .map(Some)
                    .ok_or(TaskSetError::IllegalArgument {
                        expected: NexusLevel::IT,
                        found: nexus.level(),
                    })
            },
        }
    }

    /// Task set serving `nexus`, created with its workers on first use.
    pub fn task_set(&self, nexus: &Nexus) -> Result<Arc<TaskSet>, TaskSetError> {
        let key = self.task_set_key(nexus)?;
        if let Some(set) = self.task_sets.get(&key) {
            return Ok(set.clone());
        }
        let set = self
            .task_sets
            .entry(key)
            .or_insert_with(|| {
                let set = Arc::new(TaskSet::new(self.task_set_cfg.capacity));
                for id in 0..self.task_set_cfg.workers {
                    self.tracker
                        .spawn(worker(id, set.clone(), self.shutdown.clone()));
                }
                debug!("LUN {}: task set created for {nexus}", self.lun);
                set
            })
            .clone();
        Ok(set)
    }

    /// Admits a command. Failures that happen before a task exists are
    /// answered here; everything else is answered by the task itself.
    pub async fn execute_command(
        &self,
        port: Arc<dyn TargetTransportPort>,
        command: Command,
    ) -> Result<(), PortError> {
        let nexus = command.nexus.clone();
        if nexus.lun() != Some(self.lun) {
            return check_condition(
                port.as_ref(),
                &nexus,
                SenseException::logical_unit_not_supported(),
            )
            .await;
        }

        let task = match self.factory.get_instance(port.clone(), command) {
            Ok(task) => Arc::new(task),
            Err(sense) => return check_condition(port.as_ref(), &nexus, sense).await,
        };

        let admitted = match self.task_set(&nexus) {
            Ok(set) => set.offer(task).await,
            Err(e) => Err(e),
        };
        match admitted {
            Ok(()) => Ok(()),
            Err(TaskSetError::Full { capacity }) => {
                debug!("{nexus}: task set full ({capacity})");
                port.write_response(&nexus, ScsiStatus::TaskSetFull, None)
                    .await
            },
            Err(TaskSetError::Overlapped(_)) => {
                check_condition(
                    port.as_ref(),
                    &nexus,
                    SenseException::overlapped_commands_attempted(),
                )
                .await
            },
            Err(e) => {
                warn!("{nexus}: rejected: {e}");
                check_condition(
                    port.as_ref(),
                    &nexus,
                    SenseException::internal_target_failure(),
                )
                .await
            },
        }
    }

    fn existing_set(&self, nexus: &Nexus) -> Result<Arc<TaskSet>, TaskSetError> {
        let key = self.task_set_key(nexus)?;
        self.task_sets
            .get(&key)
            .map(|s| s.clone())
            .ok_or_else(|| TaskSetError::NoSuchElement(nexus.clone()))
    }

    /// ABORT TASK.
    pub async fn abort_task(
        &self,
        nexus: &Nexus,
        interrupt: &CancellationToken,
    ) -> Result<bool, TaskSetError> {
        self.existing_set(nexus)?.remove(nexus, interrupt).await
    }

    /// ABORT TASK SET: tasks of this I_T_L nexus only.
    pub async fn abort_task_set(
        &self,
        nexus: &Nexus,
        interrupt: &CancellationToken,
    ) -> Result<usize, TaskSetError> {
        match self.existing_set(nexus) {
            Ok(set) => set.abort(nexus, interrupt).await,
            Err(TaskSetError::NoSuchElement(_)) => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// CLEAR TASK SET: every task of this logical unit the initiator's task
    /// set holds.
    pub async fn clear_task_set(
        &self,
        nexus: &Nexus,
        interrupt: &CancellationToken,
    ) -> Result<usize, TaskSetError> {
        match self.existing_set(nexus) {
            Ok(set) => set.clear(nexus, interrupt).await,
            Err(TaskSetError::NoSuchElement(_)) => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Stops the workers, aborts whatever is left and waits for both.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let interrupt = CancellationToken::new();
        let sets: Vec<Arc<TaskSet>> = self.task_sets.iter().map(|e| e.value().clone()).collect();
        for set in sets {
            match set.clear_all(&interrupt).await {
                Ok(0) => {},
                Ok(n) => info!("LUN {}: {n} task(s) aborted at shutdown", self.lun),
                Err(e) => warn!("LUN {}: shutdown sweep failed: {e}", self.lun),
            }
        }
        self.tracker.close();
        self.tracker.wait().await;
    }
}

async fn check_condition(
    port: &dyn TargetTransportPort,
    nexus: &Nexus,
    sense: SenseException,
) -> Result<(), PortError> {
    debug!("{nexus}: {sense}");
    port.write_response(
        nexus,
        ScsiStatus::CheckCondition,
        Some(Bytes::from(sense.to_bytes())),
    )
    .await
}

async fn worker(id: usize, set: Arc<TaskSet>, shutdown: CancellationToken) {
    loop {
        let task = match set.take(&shutdown).await {
            Ok(task) => task,
            Err(_) => break,
        };
        let span = debug_span!(
            "task",
            worker = id,
            nexus = %task.nexus(),
            kind = task.kind().name()
        );
        let state = task.run().instrument(span).await;
        set.finish(&task).await;
        if state == TaskState::Aborted {
            debug!("worker {id}: {} aborted", task.nexus());
        }
    }
    debug!("worker {id}: stopped");
}
