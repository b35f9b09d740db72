// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{fs, path::Path};

use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cfg::enums::{Digest, TaskSetPolicy, YesNo};

/// Smallest legal value of the length keys (RFC 7143 § 13).
pub const MIN_SEGMENT_LENGTH: u32 = 512;
/// Largest legal value of the length keys (2^24 - 1).
pub const MAX_SEGMENT_LENGTH: u32 = 16_777_215;

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Config {
    /// Identity of the target exposed through INQUIRY.
    pub target: TargetConfig,
    /// Geometry and task-set settings of the logical unit.
    pub logical_unit: LogicalUnitConfig,
    /// Operational values already resolved by login negotiation. Connections
    /// only read them.
    pub negotiation: Negotiation,
}

/// Identity parameters reported by INQUIRY and the unit serial VPD page.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TargetConfig {
    #[serde(rename = "TargetName")]
    /// Target IQN (mandatory).
    pub target_name: String,

    #[serde(default, rename = "TargetAlias")]
    /// Optional human-readable alias for the target.
    pub target_alias: String,

    #[serde(rename = "VendorId")]
    /// T10 vendor identification (at most 8 ASCII characters).
    pub vendor_id: String,

    #[serde(rename = "ProductId")]
    /// Product identification (at most 16 ASCII characters).
    pub product_id: String,

    #[serde(rename = "ProductRevision")]
    /// Product revision level (at most 4 ASCII characters).
    pub product_revision: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
/// Logical unit geometry plus the task set it owns.
pub struct LogicalUnitConfig {
    #[serde(rename = "Lun")]
    /// Logical unit number served by this unit.
    pub lun: u64,
    #[serde(rename = "BlockLength")]
    /// Logical block length in bytes.
    pub block_length: u32,
    #[serde(rename = "BlockCount")]
    /// Number of logical blocks of the in-memory backing store.
    pub block_count: u64,
    /// Task set sizing and partitioning.
    pub task_set: TaskSetConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
/// Task set bounds.
pub struct TaskSetConfig {
    #[serde(rename = "Capacity")]
    /// Maximum number of queued plus executing tasks per task set.
    pub capacity: usize,
    #[serde(rename = "Workers")]
    /// Number of workers draining each task set.
    pub workers: usize,
    #[serde(default, rename = "Policy")]
    /// Whether initiators share one task set.
    pub policy: TaskSetPolicy,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
/// Operational settings grouped by logical domains.
pub struct Negotiation {
    /// Header/Data digest choices.
    pub integrity: Integrity,
    /// Segment and burst limits.
    pub flow: Flow,
    /// Write-side flow control parameters (InitialR2T / ImmediateData).
    pub write_flow: WriteFlow,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
/// Digest choices resolved via HeaderDigest/DataDigest.
pub struct Integrity {
    #[serde(rename = "HeaderDigest")]
    /// Header digest algorithm.
    pub header_digest: Digest,
    #[serde(rename = "DataDigest")]
    /// Data digest algorithm.
    pub data_digest: Digest,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
/// Flow-control limits.
pub struct Flow {
    #[serde(rename = "MaxRecvDataSegmentLength")]
    /// Maximum data segment length the peer accepts in one PDU.
    pub max_recv_data_segment_length: u32,
    #[serde(rename = "MaxBurstLength")]
    /// Maximum solicited burst size.
    pub max_burst_length: u32,
    #[serde(rename = "FirstBurstLength")]
    /// Unsolicited burst size before an R2T is required.
    pub first_burst_length: u32,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
/// Flow-control settings for the write path.
pub struct WriteFlow {
    #[serde(rename = "InitialR2T")]
    /// Whether an R2T is demanded before any unsolicited data (Yes/No).
    pub initial_r2t: YesNo,
    #[serde(rename = "ImmediateData")]
    /// Whether immediate data inside the command PDU is permitted.
    pub immediate_data: YesNo,
}

impl Config {
    /// Loads the configuration from YAML, validates it, and returns the
    /// ready-to-use value.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        Self::from_yaml(&s)
    }

    /// Parses and validates a YAML document.
    pub fn from_yaml(s: &str) -> Result<Self> {
        let mut cfg: Config =
            serde_yaml::from_str(s).context("failed to parse config YAML")?;
        cfg.validate_and_normalize()?;
        Ok(cfg)
    }

    /// Validates invariants and normalizes derived fields.
    pub fn validate_and_normalize(&mut self) -> Result<()> {
        ensure!(
            !self.target.target_name.is_empty(),
            "TargetName must not be empty"
        );
        ensure!(
            self.target.vendor_id.len() <= 8,
            "VendorId must be at most 8 characters"
        );
        ensure!(
            self.target.product_id.len() <= 16,
            "ProductId must be at most 16 characters"
        );
        ensure!(
            self.target.product_revision.len() <= 4,
            "ProductRevision must be at most 4 characters"
        );

        let lu = &self.logical_unit;
        ensure!(
            lu.block_length >= 512 && lu.block_length.is_power_of_two(),
            "BlockLength must be a power of two >= 512, got {}",
            lu.block_length
        );
        ensure!(lu.block_count >= 1, "BlockCount must be >= 1");
        ensure!(lu.task_set.capacity >= 1, "task_set Capacity must be >= 1");
        ensure!(lu.task_set.workers >= 1, "task_set Workers must be >= 1");

        let flow = &mut self.negotiation.flow;
        for (key, v) in [
            ("MaxRecvDataSegmentLength", flow.max_recv_data_segment_length),
            ("MaxBurstLength", flow.max_burst_length),
            ("FirstBurstLength", flow.first_burst_length),
        ] {
            ensure!(
                (MIN_SEGMENT_LENGTH..=MAX_SEGMENT_LENGTH).contains(&v),
                "{key} must be in {MIN_SEGMENT_LENGTH}..={MAX_SEGMENT_LENGTH}, got {v}"
            );
        }

        // FirstBurstLength never exceeds MaxBurstLength.
        if flow.first_burst_length > flow.max_burst_length {
            warn!(
                "FirstBurstLength {} > MaxBurstLength {}, clamping",
                flow.first_burst_length, flow.max_burst_length
            );
            flow.first_burst_length = flow.max_burst_length;
        }

        Ok(())
    }

    /// Total size of the logical unit in bytes.
    pub fn capacity_bytes(&self) -> Result<usize> {
        let bytes = self
            .logical_unit
            .block_count
            .checked_mul(self.logical_unit.block_length as u64)
            .context("BlockCount * BlockLength overflows")?;
        usize::try_from(bytes).context("logical unit does not fit in memory")
    }
}
