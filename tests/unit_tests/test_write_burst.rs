// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result, anyhow, bail};
use bytes::Bytes;
use iscsi_target_core::{
    connection::{
        connection::{Connection, ConnectionPeer, InboundPdu, OutboundBatch},
        settings::{ConnectionSettings, OperationalTextKey},
    },
    models::{
        command::common::ScsiStatus,
        common::{BasicHeaderSegment, Builder, HEADER_LEN, SendingData},
        data::request::ScsiDataOutBuilder,
        data_fromat::PDUWithData,
        ready_2_transfer::response::{ReadyToTransfer, ReadyToTransferBuilder},
    },
    scsi::sense::SenseException,
    state_machine::{
        common::{StateMachine, Transition},
        data_segment::DataSegmentIterator,
        write_states::{
            Cursor, Response, SecondBurst, WriteCtx, WriteStates, WriteStatus, run_write,
        },
    },
};
use tokio::task::JoinHandle;

const LUN: u64 = 1;
const ITT: u32 = 0x42;

fn settings(initial_r2t: &str, first_burst_length: u32) -> ConnectionSettings {
    ConnectionSettings::default()
        .with(OperationalTextKey::HeaderDigest, "None")
        .with(OperationalTextKey::DataDigest, "None")
        .with(OperationalTextKey::MaxRecvDataSegmentLength, 4096)
        .with(OperationalTextKey::MaxBurstLength, 8192)
        .with(OperationalTextKey::FirstBurstLength, first_burst_length)
        .with(OperationalTextKey::InitialR2T, initial_r2t)
        .with(OperationalTextKey::ImmediateData, "Yes")
}

fn payload(len: usize) -> Bytes {
    Bytes::from((0..len).map(|i| (i % 253) as u8).collect::<Vec<u8>>())
}

fn start(
    settings: ConnectionSettings,
    data: Bytes,
) -> (JoinHandle<Result<WriteStatus>>, ConnectionPeer) {
    let (conn, peer) = Connection::new(Arc::new(settings));
    let handle = tokio::spawn(async move {
        let mut ctx = WriteCtx::new(conn, LUN, ITT);
        run_write(WriteStates::start(data), &mut ctx).await
    });
    (handle, peer)
}

fn r2t(ttt: u32, stat_sn: u32, r2t_sn: u32, offset: u32, len: u32) -> Result<InboundPdu> {
    let pdu: PDUWithData<ReadyToTransfer> = ReadyToTransferBuilder::new()
        .lun(LUN)
        .initiator_task_tag(ITT)
        .target_transfer_tag(ttt)
        .stat_sn(stat_sn)
        .r2t_sn(r2t_sn)
        .buffer_offset(offset)
        .desired_data_transfer_length(len)
        .finish()?;
    Ok(InboundPdu::ReadyToTransfer(pdu))
}

async fn next_batch(peer: &mut ConnectionPeer) -> Result<OutboundBatch> {
    tokio::time::timeout(Duration::from_secs(5), peer.outbound.recv())
        .await
        .context("timed out waiting for Data-Out")?
        .ok_or_else(|| anyhow!("outbound queue closed"))
}

/// (DataSN, BufferOffset, TTT, F, data length) of every PDU in the batch.
fn summary(batch: &OutboundBatch) -> Result<Vec<(u32, u32, u32, bool, usize)>> {
    batch
        .iter()
        .map(|pdu| -> Result<(u32, u32, u32, bool, usize)> {
            let h = pdu.header_view()?;
            assert_eq!(h.get_initiator_task_tag(), ITT);
            assert_eq!(h.get_data_length_bytes(), pdu.data.len());
            Ok((
                h.data_sn.get(),
                h.buffer_offset.get(),
                h.target_transfer_tag.get(),
                h.get_final_bit(),
                pdu.data.len(),
            ))
        })
        .collect()
}

/// Runs one R2T round on its own and returns the state it hands over to.
async fn step_round(
    settings: ConnectionSettings,
    round: SecondBurst,
) -> Result<(Response, ConnectionPeer)> {
    let (conn, peer) = Connection::new(Arc::new(settings));
    let mut ctx = WriteCtx::new(conn, LUN, ITT);
    match round.step(&mut ctx).await {
        Transition::Next(WriteStates::Response(next), Ok(_)) => Ok((next, peer)),
        Transition::Next(other, _) => bail!("round moved to {other:?}"),
        Transition::Done(r) => bail!("round ended the write: {r:?}"),
    }
}

fn with_digests(settings: ConnectionSettings) -> ConnectionSettings {
    settings
        .with(OperationalTextKey::HeaderDigest, "CRC32C")
        .with(OperationalTextKey::DataDigest, "CRC32C")
}

async fn join(handle: JoinHandle<Result<WriteStatus>>) -> Result<WriteStatus> {
    tokio::time::timeout(Duration::from_secs(5), handle).await??
}

#[tokio::test]
async fn test_r2t_driven_write() -> Result<()> {
    let data = payload(10_000);
    let (handle, mut peer) = start(settings("Yes", 8192), data.clone());

    peer.inbound.send(r2t(0x10, 5, 0, 0, 10_000)?)?;
    let first = next_batch(&mut peer).await?;
    assert_eq!(
        summary(&first)?,
        vec![
            (0, 0, 0x10, false, 4096),
            (1, 4096, 0x10, true, 4096),
        ]
    );
    let h = first[0].header_view()?;
    assert_eq!(h.exp_stat_sn.get(), 6);
    assert_eq!(&first[0].data[..], &data[..4096]);
    assert_eq!(&first[1].data[..], &data[4096..8192]);

    peer.inbound.send(r2t(0x11, 6, 1, 8192, 1808)?)?;
    let second = next_batch(&mut peer).await?;
    assert_eq!(summary(&second)?, vec![(2, 8192, 0x11, true, 1808)]);
    assert_eq!(&second[0].data[..], &data[8192..]);

    peer.inbound.send(InboundPdu::ScsiResponse {
        status: ScsiStatus::Good,
        data: Vec::new(),
    })?;
    let status = join(handle).await?;
    assert_eq!(
        status,
        WriteStatus {
            itt: ITT,
            next_data_sn: 3,
            buffer_offset: 12_288,
            sent_bytes: 10_000,
            total_bytes: 10_000,
        }
    );
    assert!(peer.outbound.try_recv().is_err(), "nothing sent after GOOD");
    Ok(())
}

#[tokio::test]
async fn test_unsolicited_first_burst() -> Result<()> {
    let data = payload(10_000);
    let (handle, mut peer) = start(settings("No", 4096), data.clone());

    let unsolicited = next_batch(&mut peer).await?;
    assert_eq!(
        summary(&unsolicited)?,
        vec![(0, 0, ScsiDataOutBuilder::DEFAULT_TTT, true, 4096)]
    );

    peer.inbound.send(r2t(0x20, 1, 0, 4096, 5904)?)?;
    let solicited = next_batch(&mut peer).await?;
    assert_eq!(
        summary(&solicited)?,
        vec![
            (1, 4096, 0x20, false, 4096),
            (2, 8192, 0x20, true, 1808),
        ]
    );
    assert_eq!(&solicited[1].data[..], &data[8192..]);

    peer.inbound.send(InboundPdu::ScsiResponse {
        status: ScsiStatus::Good,
        data: Vec::new(),
    })?;
    let status = join(handle).await?;
    assert_eq!(status.next_data_sn, 3);
    assert_eq!(status.sent_bytes, 10_000);
    Ok(())
}

#[tokio::test]
async fn test_first_burst_limited_by_payload() -> Result<()> {
    let (handle, mut peer) = start(settings("No", 8192), payload(1000));

    let unsolicited = next_batch(&mut peer).await?;
    assert_eq!(
        summary(&unsolicited)?,
        vec![(0, 0, ScsiDataOutBuilder::DEFAULT_TTT, true, 1000)]
    );

    peer.inbound.send(InboundPdu::ScsiResponse {
        status: ScsiStatus::Good,
        data: Vec::new(),
    })?;
    let status = join(handle).await?;
    assert_eq!(status.sent_bytes, 1000);
    assert_eq!(status.next_data_sn, 1);
    Ok(())
}

#[tokio::test]
async fn test_check_condition_fails_the_write() -> Result<()> {
    let (handle, peer) = start(settings("Yes", 8192), payload(512));

    peer.inbound.send(InboundPdu::ScsiResponse {
        status: ScsiStatus::CheckCondition,
        data: SenseException::lba_out_of_range().to_bytes(),
    })?;
    let err = join(handle).await.expect_err("CHECK CONDITION");
    let msg = format!("{err:#}");
    assert!(msg.contains("WRITE failed"), "{msg}");
    assert!(msg.contains("CheckCondition"), "{msg}");
    Ok(())
}

#[tokio::test]
async fn test_r2t_for_another_task_is_rejected() -> Result<()> {
    let (handle, peer) = start(settings("Yes", 8192), payload(512));

    let pdu = ReadyToTransferBuilder::new()
        .lun(LUN)
        .initiator_task_tag(ITT + 1)
        .target_transfer_tag(1)
        .desired_data_transfer_length(512)
        .finish()?;
    peer.inbound.send(InboundPdu::ReadyToTransfer(pdu))?;

    let err = join(handle).await.expect_err("foreign ITT");
    assert!(format!("{err}").contains("R2T for ITT"));
    Ok(())
}

#[tokio::test]
async fn test_closed_connection_ends_the_write() -> Result<()> {
    let (handle, peer) = start(settings("Yes", 8192), payload(512));
    drop(peer);

    let err = join(handle).await.expect_err("peer dropped");
    assert!(format!("{err}").contains("connection closed"));
    Ok(())
}

#[tokio::test]
async fn test_cancelled_write() -> Result<()> {
    let (conn, _peer) = Connection::new(Arc::new(settings("Yes", 8192)));
    let mut ctx = WriteCtx::new(conn, LUN, ITT);
    ctx.cancel.cancel();

    let err = run_write(WriteStates::start(payload(512)), &mut ctx)
        .await
        .expect_err("cancelled before any R2T");
    assert!(format!("{err}").contains("cancelled"));
    Ok(())
}

#[tokio::test]
async fn test_missing_setting_is_an_error() -> Result<()> {
    let partial = ConnectionSettings::default()
        .with(OperationalTextKey::MaxBurstLength, 8192);
    let (handle, _peer) = start(partial, payload(512));
    assert!(join(handle).await.is_err());
    Ok(())
}

#[tokio::test]
async fn test_short_tail_of_full_segment_take_is_not_final() -> Result<()> {
    let round = SecondBurst {
        iterator: DataSegmentIterator::new(payload(3000)),
        target_transfer_tag: 0x30,
        desired_data_transfer_length: 8192,
        cursor: Cursor {
            data_sn: 2,
            buffer_offset: 8192,
        },
    };
    let (next, mut peer) = step_round(settings("Yes", 8192), round).await?;

    let batch = next_batch(&mut peer).await?;
    assert_eq!(summary(&batch)?, vec![(2, 8192, 0x30, false, 3000)]);
    assert_eq!(
        next.cursor,
        Cursor {
            data_sn: 3,
            buffer_offset: 12_288,
        }
    );
    assert!(!next.iterator.has_next());
    Ok(())
}

#[tokio::test]
async fn test_exhausted_iterator_still_moves_to_response() -> Result<()> {
    let mut iterator = DataSegmentIterator::new(payload(4096));
    iterator.next_chunk(4096);
    let cursor = Cursor {
        data_sn: 3,
        buffer_offset: 8192,
    };
    let round = SecondBurst {
        iterator,
        target_transfer_tag: 0x40,
        desired_data_transfer_length: 4096,
        cursor,
    };

    let (next, mut peer) = step_round(settings("Yes", 8192), round).await?;
    assert_eq!(next.cursor, cursor);
    assert!(peer.outbound.try_recv().is_err(), "empty batch is not queued");
    Ok(())
}

#[tokio::test]
async fn test_zero_desired_length_leaves_iterator_alone() -> Result<()> {
    let round = SecondBurst {
        iterator: DataSegmentIterator::new(payload(100)),
        target_transfer_tag: 0x41,
        desired_data_transfer_length: 0,
        cursor: Cursor::default(),
    };

    let (next, mut peer) = step_round(settings("Yes", 8192), round).await?;
    assert_eq!(next.iterator.remaining(), 100);
    assert_eq!(next.cursor, Cursor::default());
    assert!(peer.outbound.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn test_wire_framing_with_digests() -> Result<()> {
    let cfg = with_digests(settings("Yes", 8192));
    let data = payload(1001);
    let (handle, mut peer) = start(cfg.clone(), data.clone());

    let mut r2t_pdu = ReadyToTransferBuilder::new()
        .lun(LUN)
        .initiator_task_tag(ITT)
        .target_transfer_tag(0x50)
        .desired_data_transfer_length(1001)
        .finish()?;
    let (bhs, body) = r2t_pdu.build(4096, true, true)?;
    assert_eq!(body.len(), 4, "R2T carries only a header digest");
    let mut r2t_wire = bhs.to_vec();
    r2t_wire.extend_from_slice(&body);
    peer.feed_r2t(&r2t_wire, &cfg)?;

    let mut batch = next_batch(&mut peer).await?;
    assert_eq!(summary(&batch)?, vec![(0, 0, 0x50, true, 1001)]);
    let wire = ConnectionPeer::frame_batch(&mut batch, &cfg)?;

    // BHS, header digest, 1001 data bytes, 3 pad bytes, data digest
    assert_eq!(wire.len(), HEADER_LEN + 4 + 1001 + 3 + 4);
    let hd = crc32c::crc32c(&wire[..HEADER_LEN]);
    assert_eq!(&wire[HEADER_LEN..HEADER_LEN + 4], &hd.to_be_bytes());

    let data_at = HEADER_LEN + 4;
    assert_eq!(&wire[data_at..data_at + 1001], &data[..]);
    assert_eq!(&wire[data_at + 1001..data_at + 1004], &[0u8; 3]);

    let mut padded = data.to_vec();
    padded.extend_from_slice(&[0u8; 3]);
    let dd = crc32c::crc32c(&padded);
    assert_eq!(&wire[data_at + 1004..], &dd.to_be_bytes());

    peer.inbound.send(InboundPdu::ScsiResponse {
        status: ScsiStatus::Good,
        data: Vec::new(),
    })?;
    assert_eq!(join(handle).await?.sent_bytes, 1001);
    Ok(())
}

#[tokio::test]
async fn test_r2t_with_bad_header_digest_is_refused() -> Result<()> {
    let cfg = with_digests(settings("Yes", 8192));
    let (_conn, peer) = Connection::new(Arc::new(cfg.clone()));

    let mut r2t_pdu = ReadyToTransferBuilder::new()
        .lun(LUN)
        .initiator_task_tag(ITT)
        .target_transfer_tag(0x51)
        .desired_data_transfer_length(512)
        .finish()?;
    let (bhs, body) = r2t_pdu.build(4096, true, true)?;
    let mut wire = bhs.to_vec();
    wire.extend_from_slice(&body);
    wire[HEADER_LEN] ^= 0xFF;

    let err = peer.feed_r2t(&wire, &cfg).expect_err("digest mismatch");
    assert!(format!("{err}").contains("HeaderDigest mismatch"), "{err}");

    // a Data-Out header is not an R2T
    let mut data_out = ScsiDataOutBuilder::new().finish(&[])?;
    let (bhs, body) = data_out.build(4096, true, true)?;
    let mut wire = bhs.to_vec();
    wire.extend_from_slice(&body);
    assert!(peer.feed_r2t(&wire, &cfg).is_err());
    Ok(())
}
