// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use anyhow::{Result, anyhow, ensure};
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::{
    connection::settings::{OperationalTextKey, SettingsProvider},
    models::{
        command::common::ScsiStatus,
        common::{Builder, HEADER_LEN},
        data::request::ScsiDataOut,
        data_fromat::PDUWithData,
        ready_2_transfer::response::ReadyToTransfer,
    },
};

/// Ordered Data-Out PDUs handed to the network layer in one go.
pub type OutboundBatch = Vec<PDUWithData<ScsiDataOut>>;

/// What the network layer feeds back to a write in progress.
#[derive(Debug)]
pub enum InboundPdu {
    ReadyToTransfer(PDUWithData<ReadyToTransfer>),
    ScsiResponse { status: ScsiStatus, data: Vec<u8> },
}

/// Network-side ends of a [`Connection`].
#[derive(Debug)]
pub struct ConnectionPeer {
    pub outbound: mpsc::UnboundedReceiver<OutboundBatch>,
    pub inbound: mpsc::UnboundedSender<InboundPdu>,
}

/// Digest switches and segment limit used to frame PDUs on the wire.
fn framing(settings: &dyn SettingsProvider) -> Result<(usize, bool, bool)> {
    Ok((
        settings.get_setting_as_int(OperationalTextKey::MaxRecvDataSegmentLength)? as usize,
        settings.digest_enabled(OperationalTextKey::HeaderDigest)?,
        settings.digest_enabled(OperationalTextKey::DataDigest)?,
    ))
}

impl ConnectionPeer {
    /// Serialises a batch in wire order: per PDU the BHS, the header digest,
    /// the padded data segment and the data digest.
    pub fn frame_batch(
        batch: &mut OutboundBatch,
        settings: &dyn SettingsProvider,
    ) -> Result<Vec<u8>> {
        let (mrdsl, header_digest, data_digest) = framing(settings)?;
        let mut wire = Vec::new();
        for pdu in batch.iter_mut() {
            let (header, body) = pdu.build(mrdsl, header_digest, data_digest)?;
            wire.extend_from_slice(&header);
            wire.extend_from_slice(&body);
        }
        Ok(wire)
    }

    /// Decodes an R2T read off the wire, checks its digests and feeds it to
    /// the write in progress.
    pub fn feed_r2t(&self, wire: &[u8], settings: &dyn SettingsProvider) -> Result<()> {
        let (_, header_digest, data_digest) = framing(settings)?;
        ensure!(
            wire.len() >= HEADER_LEN,
            "R2T shorter than a BHS: {} bytes",
            wire.len()
        );
        let mut bhs = [0u8; HEADER_LEN];
        bhs.copy_from_slice(&wire[..HEADER_LEN]);

        let mut pdu = PDUWithData::<ReadyToTransfer>::from_header_slice(bhs);
        pdu.header_view_mut()?;
        pdu.parse_with_buff(&wire[HEADER_LEN..], header_digest, data_digest)?;
        self.inbound
            .send(InboundPdu::ReadyToTransfer(pdu))
            .map_err(|_| anyhow!("connection closed: write already finished"))
    }
}

/// One connection as seen by the data path: its resolved settings, the
/// outbound PDU queue and the inbound PDU feed.
pub struct Connection {
    settings: Arc<dyn SettingsProvider>,
    outbound: mpsc::UnboundedSender<OutboundBatch>,
    inbound: Mutex<mpsc::UnboundedReceiver<InboundPdu>>,
    exp_stat_sn: AtomicU32,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("exp_stat_sn", &self.exp_stat_sn())
            .finish_non_exhaustive()
    }
}

impl Connection {
    pub fn new(settings: Arc<dyn SettingsProvider>) -> (Arc<Self>, ConnectionPeer) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let conn = Arc::new(Self {
            settings,
            outbound: out_tx,
            inbound: Mutex::new(in_rx),
            exp_stat_sn: AtomicU32::new(0),
        });
        (
            conn,
            ConnectionPeer {
                outbound: out_rx,
                inbound: in_tx,
            },
        )
    }

    #[inline]
    pub fn settings(&self) -> &dyn SettingsProvider {
        self.settings.as_ref()
    }

    /// Hands `pdus` to the network layer, preserving their order. An empty
    /// batch is dropped.
    pub fn enqueue(&self, pdus: OutboundBatch) -> Result<()> {
        if pdus.is_empty() {
            trace!("enqueue: empty batch skipped");
            return Ok(());
        }
        trace!("enqueue: {} PDU(s)", pdus.len());
        self.outbound
            .send(pdus)
            .map_err(|_| anyhow!("connection closed: outbound queue dropped"))
    }

    /// Next PDU from the network layer for this write.
    pub async fn next_inbound(&self, cancel: &CancellationToken) -> Result<InboundPdu> {
        let mut rx = self.inbound.lock().await;
        tokio::select! {
            _ = cancel.cancelled() => Err(anyhow!("next_inbound cancelled")),
            pdu = rx.recv() => pdu.ok_or_else(|| anyhow!("connection closed: inbound feed dropped")),
        }
    }

    #[inline]
    pub fn exp_stat_sn(&self) -> u32 {
        self.exp_stat_sn.load(Ordering::SeqCst)
    }

    /// Records a StatSN seen from the target side.
    pub fn observe_stat_sn(&self, stat_sn: u32) {
        self.exp_stat_sn
            .store(stat_sn.wrapping_add(1), Ordering::SeqCst);
    }
}
