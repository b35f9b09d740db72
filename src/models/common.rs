// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;

use crate::models::opcode::BhsOpcode;

/// Length of every iSCSI Basic Header Segment.
pub const HEADER_LEN: usize = 48;

/// Common functionality for any iSCSI PDU “Basic Header Segment” (BHS).
///
/// A BHS is always 48 bytes long; higher-level PDUs then may carry
/// additional AHS sections, a variable-length DataSegment, and optional
/// digests. This trait exposes the length fields the framing code needs.
pub trait BasicHeaderSegment: Sized {
    /// Copy the header into a `HEADER_LEN` buffer.
    fn to_bhs_bytes(&self, buf: &mut [u8]) -> Result<()>;

    /// first u8 of BHS
    fn get_opcode(&self) -> Result<BhsOpcode>;

    fn get_initiator_task_tag(&self) -> u32;

    /// Number of extra AHS bytes (always a multiple of 4).
    fn get_ahs_length_bytes(&self) -> usize;

    fn set_ahs_length_bytes(&mut self, len: u8);

    /// Number of actual payload bytes in the DataSegment.
    fn get_data_length_bytes(&self) -> usize;

    fn set_data_length_bytes(&mut self, len: u32);
}

/// Final / Continue handling for PDUs that may span a sequence.
pub trait SendingData: Sized {
    fn get_final_bit(&self) -> bool;

    fn set_final_bit(&mut self);

    fn get_continue_bit(&self) -> bool;

    fn set_continue_bit(&mut self);
}

/// Typed, validated mutable view over a raw BHS buffer.
pub trait FromBytes: Sized {
    fn from_bhs_bytes(bytes: &mut [u8]) -> Result<&mut Self>;
}

pub trait Builder: Sized {
    type Header: AsRef<[u8]>;

    /// Append raw bytes to the DataSegment (automatically updates the length
    /// fields in the BHS).
    fn append_data(&mut self, more: &[u8]) -> Result<()>;

    /// Produce a `(header_bytes, body_bytes)` pair ready for writing. The
    /// body holds AHS, digests, the DataSegment and its padding.
    fn build(
        &mut self,
        max_recv_data_segment_length: usize,
        enable_header_digest: bool,
        enable_data_digest: bool,
    ) -> Result<(Self::Header, Vec<u8>)>;
}
