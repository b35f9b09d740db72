// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! SAM nexus: the identity path initiator → target port → logical unit →
//! task tag.

use core::fmt;

/// How many components of the path are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NexusLevel {
    I,
    IT,
    ITL,
    ITLQ,
}

impl fmt::Display for NexusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NexusLevel::I => "I",
            NexusLevel::IT => "I_T",
            NexusLevel::ITL => "I_T_L",
            NexusLevel::ITLQ => "I_T_L_Q",
        })
    }
}

/// Immutable nexus. A component is only present when every component before
/// it is, which the constructors enforce.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Nexus {
    initiator: String,
    target_port: Option<String>,
    lun: Option<u64>,
    task_tag: Option<u32>,
}

impl Nexus {
    pub fn i(initiator: impl Into<String>) -> Self {
        Self {
            initiator: initiator.into(),
            target_port: None,
            lun: None,
            task_tag: None,
        }
    }

    pub fn i_t(initiator: impl Into<String>, target_port: impl Into<String>) -> Self {
        Self {
            target_port: Some(target_port.into()),
            ..Self::i(initiator)
        }
    }

    pub fn i_t_l(
        initiator: impl Into<String>,
        target_port: impl Into<String>,
        lun: u64,
    ) -> Self {
        Self {
            lun: Some(lun),
            ..Self::i_t(initiator, target_port)
        }
    }

    pub fn i_t_l_q(
        initiator: impl Into<String>,
        target_port: impl Into<String>,
        lun: u64,
        task_tag: u32,
    ) -> Self {
        Self {
            task_tag: Some(task_tag),
            ..Self::i_t_l(initiator, target_port, lun)
        }
    }

    pub fn level(&self) -> NexusLevel {
        match (&self.target_port, self.lun, self.task_tag) {
            (None, ..) => NexusLevel::I,
            (Some(_), None, _) => NexusLevel::IT,
            (Some(_), Some(_), None) => NexusLevel::ITL,
            (Some(_), Some(_), Some(_)) => NexusLevel::ITLQ,
        }
    }

    #[inline]
    pub fn initiator(&self) -> &str {
        &self.initiator
    }

    #[inline]
    pub fn target_port(&self) -> Option<&str> {
        self.target_port.as_deref()
    }

    #[inline]
    pub fn lun(&self) -> Option<u64> {
        self.lun
    }

    #[inline]
    pub fn task_tag(&self) -> Option<u32> {
        self.task_tag
    }

    /// Prefix containment: `self` contains `other` when every component
    /// present in `self` is equal in `other`. A nexus contains itself.
    pub fn contains(&self, other: &Nexus) -> bool {
        if self.initiator != other.initiator {
            return false;
        }
        if self.target_port.is_some() && self.target_port != other.target_port {
            return false;
        }
        if self.lun.is_some() && self.lun != other.lun {
            return false;
        }
        self.task_tag.is_none() || self.task_tag == other.task_tag
    }

    /// Both nexuses address the same logical unit through the same target
    /// port, whatever the initiator.
    pub fn same_logical_unit(&self, other: &Nexus) -> bool {
        self.target_port.is_some()
            && self.lun.is_some()
            && self.target_port == other.target_port
            && self.lun == other.lun
    }

    /// The I_T part of this nexus, if present.
    pub fn i_t_prefix(&self) -> Option<Nexus> {
        self.target_port
            .as_ref()
            .map(|t| Nexus::i_t(self.initiator.clone(), t.clone()))
    }

    /// The I_T_L part of this nexus, if present.
    pub fn i_t_l_prefix(&self) -> Option<Nexus> {
        match (&self.target_port, self.lun) {
            (Some(t), Some(l)) => Some(Nexus::i_t_l(self.initiator.clone(), t.clone(), l)),
            _ => None,
        }
    }
}

impl fmt::Display for Nexus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}", self.level(), self.initiator)?;
        if let Some(t) = &self.target_port {
            write!(f, ", {t}")?;
        }
        if let Some(l) = self.lun {
            write!(f, ", lun {l}")?;
        }
        if let Some(q) = self.task_tag {
            write!(f, ", tag {q:#010x}")?;
        }
        write!(f, "]")
    }
}
