// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use anyhow::{Context, Result, anyhow, ensure};
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    connection::{
        connection::{Connection, InboundPdu},
        settings::{OperationalTextKey, SettingsProvider},
    },
    models::{
        command::common::ScsiStatus,
        common::BasicHeaderSegment,
        data::{
            request::{ScsiDataOut, ScsiDataOutBuilder},
            sense_data::SenseData,
        },
        data_fromat::PDUWithData,
    },
    state_machine::{
        common::{StateMachine, Transition},
        data_segment::DataSegmentIterator,
    },
    utils::{BoxFuture, saturate_u32},
};

/// Connection-side context of one WRITE.
#[derive(Debug)]
pub struct WriteCtx {
    pub conn: Arc<Connection>,
    pub lun: u64,
    pub itt: u32,
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteStatus {
    pub itt: u32,
    pub next_data_sn: u32,
    pub buffer_offset: u32,
    pub sent_bytes: usize,
    pub total_bytes: usize,
}

/// Settings read at the start of every burst.
#[derive(Debug, Clone, Copy)]
struct BurstLimits {
    max_burst_length: u32,
    max_recv_data_segment_length: u32,
    first_burst_length: u32,
    initial_r2t: bool,
    header_digest: bool,
    data_digest: bool,
}

impl BurstLimits {
    fn read(s: &dyn SettingsProvider) -> Result<Self> {
        let limits = Self {
            max_burst_length: s.get_setting_as_int(OperationalTextKey::MaxBurstLength)?,
            max_recv_data_segment_length: s
                .get_setting_as_int(OperationalTextKey::MaxRecvDataSegmentLength)?,
            first_burst_length: s.get_setting_as_int(OperationalTextKey::FirstBurstLength)?,
            initial_r2t: s.get_setting_as_bool(OperationalTextKey::InitialR2T)?,
            header_digest: s.digest_enabled(OperationalTextKey::HeaderDigest)?,
            data_digest: s.digest_enabled(OperationalTextKey::DataDigest)?,
        };
        ensure!(
            limits.max_recv_data_segment_length > 0,
            "MaxRecvDataSegmentLength is zero"
        );
        Ok(limits)
    }
}

/// Sequence counters handed from state to state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub data_sn: u32,
    pub buffer_offset: u32,
}

impl WriteCtx {
    pub fn new(conn: Arc<Connection>, lun: u64, itt: u32) -> Self {
        Self {
            conn,
            lun,
            itt,
            cancel: CancellationToken::new(),
        }
    }

    fn status(&self, it: &DataSegmentIterator, cursor: Cursor) -> WriteStatus {
        WriteStatus {
            itt: self.itt,
            next_data_sn: cursor.data_sn,
            buffer_offset: cursor.buffer_offset,
            sent_bytes: it.position(),
            total_bytes: it.total(),
        }
    }

    /// Cuts up to `budget` bytes off `it` into Data-Out PDUs.
    ///
    /// Every chunk advances the offset by a full MaxRecvDataSegmentLength and
    /// the budget shrinks by the same amount, whatever the chunk size. A
    /// chunk is final only when the remaining budget fits in one segment; a
    /// full-segment take stays non-final even if the buffer comes back short.
    fn paginate(
        &self,
        it: &mut DataSegmentIterator,
        limits: &BurstLimits,
        ttt: u32,
        budget: u32,
        cursor: &mut Cursor,
    ) -> Result<Vec<PDUWithData<ScsiDataOut>>> {
        let mrdsl = limits.max_recv_data_segment_length;
        let mut bytes_to_transfer = budget;
        let mut pdus = Vec::new();

        while bytes_to_transfer > 0 && it.has_next() {
            let fin = bytes_to_transfer <= mrdsl;
            let take = bytes_to_transfer.min(mrdsl) as usize;
            let chunk = it.next_chunk(take);

            let pdu = ScsiDataOutBuilder::new()
                .lun(self.lun)
                .initiator_task_tag(self.itt)
                .target_transfer_tag(ttt)
                .exp_stat_sn(self.conn.exp_stat_sn())
                .data_sn(cursor.data_sn)
                .buffer_offset(cursor.buffer_offset)
                .fin(fin)
                .with_header_digest(limits.header_digest)
                .with_data_digest(limits.data_digest)
                .finish(&chunk)
                .with_context(|| format!("Data-out DataSN={}", cursor.data_sn))?;
            pdus.push(pdu);

            cursor.data_sn = cursor.data_sn.wrapping_add(1);
            cursor.buffer_offset = cursor.buffer_offset.wrapping_add(mrdsl);
            bytes_to_transfer = bytes_to_transfer.saturating_sub(mrdsl);
        }
        Ok(pdus)
    }
}

/// Unsolicited data ahead of the first R2T, only when InitialR2T=No.
#[derive(Debug)]
pub struct FirstBurst {
    pub iterator: DataSegmentIterator,
}

/// One R2T round.
#[derive(Debug)]
pub struct SecondBurst {
    pub iterator: DataSegmentIterator,
    pub target_transfer_tag: u32,
    pub desired_data_transfer_length: u32,
    pub cursor: Cursor,
}

/// Waits for the next R2T or for the SCSI Response.
#[derive(Debug)]
pub struct Response {
    pub iterator: DataSegmentIterator,
    pub cursor: Cursor,
}

#[derive(Debug)]
pub enum WriteStates {
    FirstBurst(FirstBurst),
    SecondBurst(SecondBurst),
    Response(Response),
}

impl WriteStates {
    /// Entry state for a WRITE carrying `payload`.
    pub fn start(payload: impl Into<Bytes>) -> Self {
        Self::FirstBurst(FirstBurst {
            iterator: DataSegmentIterator::new(payload),
        })
    }
}

pub type WriteStep = Transition<WriteStates, Result<WriteStatus>>;

impl StateMachine<WriteCtx, WriteStep> for FirstBurst {
    type StepResult<'a>
        = BoxFuture<'a, WriteStep>
    where
        Self: 'a,
        WriteCtx: 'a;

    fn step<'a>(self, ctx: &'a mut WriteCtx) -> Self::StepResult<'a> {
        Box::pin(async move {
            let FirstBurst { mut iterator } = self;
            let limits = match BurstLimits::read(ctx.conn.settings()) {
                Ok(l) => l,
                Err(e) => return Transition::Done(Err(e)),
            };

            let mut cursor = Cursor::default();
            if !limits.initial_r2t {
                let budget = limits
                    .first_burst_length
                    .min(saturate_u32(iterator.remaining() as u64));
                let pdus = match ctx.paginate(
                    &mut iterator,
                    &limits,
                    ScsiDataOutBuilder::DEFAULT_TTT,
                    budget,
                    &mut cursor,
                ) {
                    Ok(p) => p,
                    Err(e) => return Transition::Done(Err(e)),
                };
                debug!("first burst: {} unsolicited PDU(s)", pdus.len());
                if let Err(e) = ctx.conn.enqueue(pdus) {
                    return Transition::Done(Err(e));
                }
            }

            let st = ctx.status(&iterator, cursor);
            Transition::Next(WriteStates::Response(Response { iterator, cursor }), Ok(st))
        })
    }
}

impl StateMachine<WriteCtx, WriteStep> for SecondBurst {
    type StepResult<'a>
        = BoxFuture<'a, WriteStep>
    where
        Self: 'a,
        WriteCtx: 'a;

    fn step<'a>(self, ctx: &'a mut WriteCtx) -> Self::StepResult<'a> {
        Box::pin(async move {
            let SecondBurst {
                mut iterator,
                target_transfer_tag,
                desired_data_transfer_length,
                mut cursor,
            } = self;
            let limits = match BurstLimits::read(ctx.conn.settings()) {
                Ok(l) => l,
                Err(e) => return Transition::Done(Err(e)),
            };

            let budget = limits.max_burst_length.min(desired_data_transfer_length);
            let pdus = match ctx.paginate(
                &mut iterator,
                &limits,
                target_transfer_tag,
                budget,
                &mut cursor,
            ) {
                Ok(p) => p,
                Err(e) => return Transition::Done(Err(e)),
            };
            debug!(
                "R2T TTT={target_transfer_tag:#x}: {} PDU(s), next DataSN={} offset={}",
                pdus.len(),
                cursor.data_sn,
                cursor.buffer_offset
            );
            if let Err(e) = ctx.conn.enqueue(pdus) {
                return Transition::Done(Err(e));
            }

            let st = ctx.status(&iterator, cursor);
            Transition::Next(WriteStates::Response(Response { iterator, cursor }), Ok(st))
        })
    }
}

impl StateMachine<WriteCtx, WriteStep> for Response {
    type StepResult<'a>
        = BoxFuture<'a, WriteStep>
    where
        Self: 'a,
        WriteCtx: 'a;

    fn step<'a>(self, ctx: &'a mut WriteCtx) -> Self::StepResult<'a> {
        Box::pin(async move {
            let Response { iterator, cursor } = self;
            let pdu = match ctx.conn.next_inbound(&ctx.cancel).await {
                Ok(p) => p,
                Err(e) => return Transition::Done(Err(e)),
            };

            match pdu {
                InboundPdu::ReadyToTransfer(r2t) => {
                    let header = match r2t.header_view() {
                        Ok(h) => h,
                        Err(e) => {
                            return Transition::Done(Err(anyhow!(
                                "failed read pdu ReadyToTransfer: {e}"
                            )));
                        },
                    };
                    let itt = header.get_initiator_task_tag();
                    if itt != ctx.itt {
                        return Transition::Done(Err(anyhow!(
                            "R2T for ITT {itt:#x}, expected {:#x}",
                            ctx.itt
                        )));
                    }
                    ctx.conn.observe_stat_sn(header.stat_sn.get());

                    let r2t_offset = header.buffer_offset.get();
                    if r2t_offset != cursor.buffer_offset {
                        debug!(
                            "R2T offset {r2t_offset} differs from local offset {}",
                            cursor.buffer_offset
                        );
                    }

                    let st = ctx.status(&iterator, cursor);
                    Transition::Next(
                        WriteStates::SecondBurst(SecondBurst {
                            iterator,
                            target_transfer_tag: header.target_transfer_tag.get(),
                            desired_data_transfer_length: header
                                .desired_data_transfer_length
                                .get(),
                            cursor,
                        }),
                        Ok(st),
                    )
                },
                InboundPdu::ScsiResponse { status, data } => {
                    if status != ScsiStatus::Good {
                        let err = match SenseData::parse(&data) {
                            Ok(sense) => anyhow!("WRITE failed: {status:?}, {sense:?}"),
                            Err(_) => anyhow!("WRITE failed: {status:?}"),
                        };
                        return Transition::Done(Err(err));
                    }
                    if iterator.has_next() {
                        warn!(
                            "GOOD status with {} of {} bytes unsent",
                            iterator.remaining(),
                            iterator.total()
                        );
                    }
                    Transition::Done(Ok(ctx.status(&iterator, cursor)))
                },
            }
        })
    }
}

/// Drive the write state machine until it completes.
pub async fn run_write(mut state: WriteStates, ctx: &mut WriteCtx) -> Result<WriteStatus> {
    loop {
        debug!("{state:?}");
        let step = match state {
            WriteStates::FirstBurst(s) => s.step(ctx).await,
            WriteStates::SecondBurst(s) => s.step(ctx).await,
            WriteStates::Response(s) => s.step(ctx).await,
        };
        state = match step {
            Transition::Next(next, Ok(_)) => next,
            Transition::Next(_, Err(e)) | Transition::Done(Err(e)) => return Err(e),
            Transition::Done(Ok(done)) => return Ok(done),
        };
    }
}
