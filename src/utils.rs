// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{future::Future, pin::Pin};

/// Boxed, sendable future used by the dyn-safe async traits
/// (transport port, task execution).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Caps a 64-bit quantity to the largest value representable in a 32-bit
/// wire field.
#[inline]
pub fn saturate_u32(v: u64) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}

/// Number of zero bytes needed to pad `n` up to a 4-byte boundary.
#[inline]
pub fn pad_len(n: usize) -> usize {
    (4 - (n % 4)) % 4
}
