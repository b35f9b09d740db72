// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use iscsi_target_core::{
    cfg::{
        cli::resolve_config_path,
        config::{Config, TargetConfig},
    },
    models::{command::common::ScsiStatus, data::sense_data::SenseData},
    scsi::{
        command::Command,
        nexus::Nexus,
        port::{PortError, TargetTransportPort},
        registry::{InquiryDataRegistry, ModePageRegistry},
        store::{BackingStore, MemoryStore, StoreError},
    },
    task::{
        common::{TaskResources, TaskState},
        factory::TaskFactory,
    },
    utils::BoxFuture,
};
use tokio::sync::mpsc;

pub const INITIATOR: &str = "iqn.2025-01.io.example:host-a";
pub const TARGET_PORT: &str = "tpg1";

pub fn load_config() -> Result<Config> {
    resolve_config_path("tests/config.yaml")
        .and_then(Config::load_from_file)
        .context("failed to resolve or load config")
}

pub fn target() -> TargetConfig {
    TargetConfig {
        target_name: "iqn.2025-01.io.example:disk0".to_string(),
        target_alias: String::new(),
        vendor_id: "RUSTTGT".to_string(),
        product_id: "MEMDISK".to_string(),
        product_revision: "0.08".to_string(),
    }
}

pub fn resources_with(store: Arc<dyn BackingStore>, block_length: u32) -> Arc<TaskResources> {
    Arc::new(TaskResources {
        store,
        block_length,
        mode_pages: Arc::new(ModePageRegistry::default()),
        inquiry: Arc::new(InquiryDataRegistry::from_target(&target())),
    })
}

pub fn resources(block_count: usize, block_length: u32) -> Arc<TaskResources> {
    resources_with(
        Arc::new(MemoryStore::new(block_count * block_length as usize)),
        block_length,
    )
}

pub fn itlq(lun: u64, tag: u32) -> Nexus {
    Nexus::i_t_l_q(INITIATOR, TARGET_PORT, lun, tag)
}

/// Reports a huge capacity without allocating it; reads return zeros.
#[derive(Debug)]
pub struct SparseStore {
    pub capacity: u64,
}

impl BackingStore for SparseStore {
    fn read(&self, offset: u64, len: usize) -> Result<Bytes, StoreError> {
        if offset + len as u64 > self.capacity {
            return Err(StoreError::OutOfRange {
                offset,
                len,
                capacity: self.capacity,
            });
        }
        Ok(Bytes::from(vec![0u8; len]))
    }

    fn write(&self, _offset: u64, _data: &[u8]) -> Result<(), StoreError> {
        Ok(())
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortEvent {
    DataIn(Bytes),
    Response {
        status: ScsiStatus,
        sense: Option<Bytes>,
    },
}

/// Transport port that serves queued Data-Out and reports everything the
/// task sends back over a channel.
#[derive(Debug)]
pub struct MockPort {
    data_out: Mutex<VecDeque<Bytes>>,
    stall_reads: bool,
    events: mpsc::UnboundedSender<(Nexus, PortEvent)>,
}

pub type Events = mpsc::UnboundedReceiver<(Nexus, PortEvent)>;

impl MockPort {
    pub fn new() -> (Arc<Self>, Events) {
        Self::build(false)
    }

    /// `read_data` never resolves, so a WRITE stays executing until aborted.
    pub fn stalled() -> (Arc<Self>, Events) {
        Self::build(true)
    }

    fn build(stall_reads: bool) -> (Arc<Self>, Events) {
        let (tx, rx) = mpsc::unbounded_channel();
        let port = Arc::new(Self {
            data_out: Mutex::new(VecDeque::new()),
            stall_reads,
            events: tx,
        });
        (port, rx)
    }

    pub fn push_data_out(&self, data: impl Into<Bytes>) {
        self.data_out
            .lock()
            .expect("data-out queue poisoned")
            .push_back(data.into());
    }
}

impl TargetTransportPort for MockPort {
    fn read_data<'a>(
        &'a self,
        _nexus: &'a Nexus,
        _len: usize,
    ) -> BoxFuture<'a, Result<Bytes, PortError>> {
        Box::pin(async move {
            if self.stall_reads {
                std::future::pending::<()>().await;
            }
            self.data_out
                .lock()
                .expect("data-out queue poisoned")
                .pop_front()
                .ok_or(PortError::Closed)
        })
    }

    fn write_data<'a>(
        &'a self,
        nexus: &'a Nexus,
        data: Bytes,
    ) -> BoxFuture<'a, Result<(), PortError>> {
        Box::pin(async move {
            self.events
                .send((nexus.clone(), PortEvent::DataIn(data)))
                .map_err(|_| PortError::Closed)
        })
    }

    fn write_response<'a>(
        &'a self,
        nexus: &'a Nexus,
        status: ScsiStatus,
        sense: Option<Bytes>,
    ) -> BoxFuture<'a, Result<(), PortError>> {
        Box::pin(async move {
            self.events
                .send((nexus.clone(), PortEvent::Response { status, sense }))
                .map_err(|_| PortError::Closed)
        })
    }
}

pub async fn next_event(rx: &mut Events) -> Result<(Nexus, PortEvent)> {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .context("timed out waiting for a port event")?
        .ok_or_else(|| anyhow!("port event channel closed"))
}

/// Builds the task for `command` and runs it on the current runtime.
pub async fn run_command(
    resources: Arc<TaskResources>,
    port: Arc<MockPort>,
    command: Command,
) -> Result<TaskState> {
    let task = TaskFactory::new(resources).get_instance(port, command)?;
    Ok(task.run().await)
}

/// Everything the port saw so far.
pub fn drain(rx: &mut Events) -> Vec<PortEvent> {
    let mut out = Vec::new();
    while let Ok((_, ev)) = rx.try_recv() {
        out.push(ev);
    }
    out
}

pub fn good() -> PortEvent {
    PortEvent::Response {
        status: ScsiStatus::Good,
        sense: None,
    }
}

/// Sense key / ASC / ASCQ of a CHECK CONDITION event.
pub fn sense_of(ev: &PortEvent) -> Result<(u8, u8, u8)> {
    match ev {
        PortEvent::Response {
            status: ScsiStatus::CheckCondition,
            sense: Some(raw),
        } => {
            let s = SenseData::parse(raw)?;
            Ok((s.sense_key, s.asc, s.ascq))
        },
        other => Err(anyhow!("expected CHECK CONDITION, got {other:?}")),
    }
}
