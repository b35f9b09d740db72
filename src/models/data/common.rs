// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Flags byte of the SCSI Data-Out PDU.

use core::fmt;

use anyhow::Result;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

bitflags::bitflags! {
    #[derive(Default, Debug, PartialEq)]
    /// Flags for iSCSI SCSI Data-Out PDU
    pub struct DataOutFlags: u8 {
        /// Final bit (F) - last Data-Out PDU of the sequence
        const FINAL = 0b1000_0000;
    }
}

impl TryFrom<u8> for DataOutFlags {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        DataOutFlags::from_bits(value)
            .ok_or_else(|| anyhow::anyhow!("invalid DataOutFlags: {:#010b}", value))
    }
}

/// Wire view for **Data-OUT flags** (byte 1 of the PDU).
#[repr(transparent)]
#[derive(Default, Clone, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct RawDataOutFlags(u8);

impl RawDataOutFlags {
    pub const FINAL: u8 = 0b1000_0000;

    #[inline]
    pub const fn raw(&self) -> u8 {
        self.0
    }

    #[inline]
    pub fn fin(&self) -> bool {
        self.0 & Self::FINAL != 0
    }

    #[inline]
    pub fn set_fin(&mut self, on: bool) {
        if on {
            self.0 |= Self::FINAL;
        } else {
            self.0 &= !Self::FINAL;
        }
    }
}

impl From<DataOutFlags> for RawDataOutFlags {
    #[inline]
    fn from(f: DataOutFlags) -> Self {
        Self(f.bits())
    }
}

impl TryFrom<&RawDataOutFlags> for DataOutFlags {
    type Error = anyhow::Error;

    #[inline]
    fn try_from(r: &RawDataOutFlags) -> Result<Self> {
        DataOutFlags::try_from(r.raw())
    }
}

impl fmt::Debug for RawDataOutFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fin() {
            write!(f, "RawDataOutFlags {{ FIN }}")
        } else {
            write!(f, "RawDataOutFlags {{ }}")
        }
    }
}
