// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use core::fmt;

use bytes::Bytes;

/// Forward-only cursor producing chunks of a logical data buffer. It cannot
/// be rewound; build a new one to start over.
pub struct DataSegmentIterator {
    data: Bytes,
    position: usize,
}

impl DataSegmentIterator {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            position: 0,
        }
    }

    #[inline]
    pub fn has_next(&self) -> bool {
        self.position < self.data.len()
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }

    /// Bytes already handed out.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Size of the whole buffer.
    #[inline]
    pub fn total(&self) -> usize {
        self.data.len()
    }

    /// Up to `len` bytes; shorter only at the end of the buffer.
    pub fn next_chunk(&mut self, len: usize) -> Bytes {
        let end = self.position + len.min(self.remaining());
        let chunk = self.data.slice(self.position..end);
        self.position = end;
        chunk
    }
}

impl fmt::Debug for DataSegmentIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataSegmentIterator({}/{})", self.position, self.data.len())
    }
}
