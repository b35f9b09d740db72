// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;
use std::{collections::HashMap, str::FromStr};

use anyhow::{Context, Result, anyhow, bail};

use crate::cfg::config::Negotiation;

/// Operational keys the data path reads (RFC 7143 § 13).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationalTextKey {
    HeaderDigest,
    DataDigest,
    MaxRecvDataSegmentLength,
    MaxBurstLength,
    FirstBurstLength,
    InitialR2T,
    ImmediateData,
}

impl OperationalTextKey {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::HeaderDigest => "HeaderDigest",
            Self::DataDigest => "DataDigest",
            Self::MaxRecvDataSegmentLength => "MaxRecvDataSegmentLength",
            Self::MaxBurstLength => "MaxBurstLength",
            Self::FirstBurstLength => "FirstBurstLength",
            Self::InitialR2T => "InitialR2T",
            Self::ImmediateData => "ImmediateData",
        }
    }
}

impl fmt::Display for OperationalTextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationalTextKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "HeaderDigest" => Self::HeaderDigest,
            "DataDigest" => Self::DataDigest,
            "MaxRecvDataSegmentLength" => Self::MaxRecvDataSegmentLength,
            "MaxBurstLength" => Self::MaxBurstLength,
            "FirstBurstLength" => Self::FirstBurstLength,
            "InitialR2T" => Self::InitialR2T,
            "ImmediateData" => Self::ImmediateData,
            other => bail!("unknown operational key {other:?}"),
        })
    }
}

/// Resolved operational values of one connection/session. Values are the
/// text form exchanged during login.
pub trait SettingsProvider: Send + Sync {
    fn get_setting(&self, key: OperationalTextKey) -> Result<String>;

    fn get_setting_as_int(&self, key: OperationalTextKey) -> Result<u32> {
        let raw = self.get_setting(key)?;
        raw.parse::<u32>()
            .with_context(|| format!("{key}={raw:?} is not a number"))
    }

    fn get_setting_as_bool(&self, key: OperationalTextKey) -> Result<bool> {
        match self.get_setting(key)?.as_str() {
            "Yes" => Ok(true),
            "No" => Ok(false),
            other => Err(anyhow!("{key}={other:?} is not Yes/No")),
        }
    }

    /// `true` when the digest key resolved to CRC32C.
    fn digest_enabled(&self, key: OperationalTextKey) -> Result<bool> {
        match self.get_setting(key)?.as_str() {
            "CRC32C" => Ok(true),
            "None" => Ok(false),
            other => Err(anyhow!("{key}={other:?} is not a known digest")),
        }
    }
}

/// Map-backed provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionSettings {
    values: HashMap<OperationalTextKey, String>,
}

impl ConnectionSettings {
    pub fn from_negotiation(n: &Negotiation) -> Self {
        Self::default()
            .with(OperationalTextKey::HeaderDigest, n.integrity.header_digest)
            .with(OperationalTextKey::DataDigest, n.integrity.data_digest)
            .with(
                OperationalTextKey::MaxRecvDataSegmentLength,
                n.flow.max_recv_data_segment_length,
            )
            .with(OperationalTextKey::MaxBurstLength, n.flow.max_burst_length)
            .with(OperationalTextKey::FirstBurstLength, n.flow.first_burst_length)
            .with(OperationalTextKey::InitialR2T, n.write_flow.initial_r2t)
            .with(OperationalTextKey::ImmediateData, n.write_flow.immediate_data)
    }

    pub fn with(mut self, key: OperationalTextKey, value: impl ToString) -> Self {
        self.values.insert(key, value.to_string());
        self
    }
}

impl SettingsProvider for ConnectionSettings {
    fn get_setting(&self, key: OperationalTextKey) -> Result<String> {
        self.values
            .get(&key)
            .cloned()
            .ok_or_else(|| anyhow!("{key} was not negotiated"))
    }
}
