// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::RwLock;

use bytes::Bytes;
use thiserror::Error;
use tracing::warn;

use crate::scsi::sense::SenseException;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("access {offset}+{len} beyond capacity {capacity}")]
    OutOfRange {
        offset: u64,
        len: usize,
        capacity: u64,
    },
    #[error("backing store lock poisoned")]
    Poisoned,
}

impl From<StoreError> for SenseException {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::OutOfRange { .. } => SenseException::lba_out_of_range(),
            StoreError::Poisoned => SenseException::internal_target_failure(),
        }
    }
}

/// Random-access byte container behind a logical unit. Implementations
/// serialise overlapping accesses themselves; tasks call it concurrently
/// without further locking.
pub trait BackingStore: Send + Sync {
    fn read(&self, offset: u64, len: usize) -> Result<Bytes, StoreError>;

    fn write(&self, offset: u64, data: &[u8]) -> Result<(), StoreError>;

    /// Size in bytes.
    fn capacity(&self) -> u64;
}

/// In-memory store guarded by a reader/writer lock.
#[derive(Debug)]
pub struct MemoryStore {
    buf: RwLock<Vec<u8>>,
    capacity: u64,
}

impl MemoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: RwLock::new(vec![0u8; capacity]),
            capacity: capacity as u64,
        }
    }

    fn range(&self, offset: u64, len: usize) -> Result<std::ops::Range<usize>, StoreError> {
        let out_of_range = StoreError::OutOfRange {
            offset,
            len,
            capacity: self.capacity,
        };
        let end = offset
            .checked_add(len as u64)
            .ok_or_else(|| out_of_range.clone())?;
        if end > self.capacity {
            return Err(out_of_range);
        }
        Ok(offset as usize..end as usize)
    }
}

impl BackingStore for MemoryStore {
    fn read(&self, offset: u64, len: usize) -> Result<Bytes, StoreError> {
        let range = self.range(offset, len)?;
        let guard = self.buf.read().map_err(|_| {
            warn!("memory store: read lock poisoned");
            StoreError::Poisoned
        })?;
        Ok(Bytes::copy_from_slice(&guard[range]))
    }

    fn write(&self, offset: u64, data: &[u8]) -> Result<(), StoreError> {
        let range = self.range(offset, data.len())?;
        let mut guard = self.buf.write().map_err(|_| {
            warn!("memory store: write lock poisoned");
            StoreError::Poisoned
        })?;
        guard[range].copy_from_slice(data);
        Ok(())
    }

    #[inline]
    fn capacity(&self) -> u64 {
        self.capacity
    }
}
