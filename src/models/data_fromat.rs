// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{any::type_name, fmt, marker::PhantomData};

use anyhow::{Context, Result, anyhow, bail};
use crc32c::crc32c_append;
use zerocopy::{
    BigEndian, FromBytes as ZFromBytes, Immutable, IntoBytes, KnownLayout, U32,
};

use crate::{
    models::common::{BasicHeaderSegment, Builder, FromBytes, HEADER_LEN},
    utils::pad_len,
};

pub trait ZeroCopyType: KnownLayout + Immutable + IntoBytes + ZFromBytes {}

#[inline]
fn crc32c_with_padding(parts: &[&[u8]], pad: usize) -> u32 {
    let mut acc = 0u32;
    for p in parts {
        if !p.is_empty() {
            acc = crc32c_append(acc, p);
        }
    }
    if pad != 0 {
        let zeros = [0u8; 3];
        acc = crc32c_append(acc, &zeros[..pad]);
    }
    acc
}

/// CRC32C over BHS + AHS (+ AHS padding).
#[inline]
pub fn compute_header_digest(bhs: &[u8], ahs: &[u8]) -> u32 {
    crc32c_with_padding(&[bhs, ahs], pad_len(ahs.len()))
}

/// CRC32C over the DataSegment including its padding.
#[inline]
pub fn compute_data_digest(data: &[u8]) -> u32 {
    crc32c_with_padding(&[data], pad_len(data.len()))
}

/// A BHS of type `T` plus everything that may follow it on the wire.
#[derive(PartialEq)]
pub struct PDUWithData<T> {
    pub header_buf: [u8; HEADER_LEN],
    pub additional_header: Vec<u8>,
    pub header_digest: Option<U32<BigEndian>>,
    pub data: Vec<u8>,
    pub data_digest: Option<U32<BigEndian>>,

    _marker: PhantomData<T>,
}

impl<T> PDUWithData<T> {
    pub fn from_header_slice(header_buf: [u8; HEADER_LEN]) -> Self {
        Self {
            header_buf,
            additional_header: Vec::new(),
            header_digest: None,
            data: Vec::new(),
            data_digest: None,
            _marker: PhantomData,
        }
    }

    /// Fill both digest slots from the current header and data.
    pub fn seal_digests(&mut self, enable_header_digest: bool, enable_data_digest: bool) {
        self.header_digest = enable_header_digest.then(|| {
            U32::<BigEndian>::new(compute_header_digest(
                &self.header_buf,
                &self.additional_header,
            ))
        });
        self.data_digest = (enable_data_digest && !self.data.is_empty())
            .then(|| U32::<BigEndian>::new(compute_data_digest(&self.data)));
    }
}

impl<T> PDUWithData<T>
where T: BasicHeaderSegment + FromBytes + ZeroCopyType
{
    /// Header view (`&T`) backed by `self.header_buf`.
    #[inline]
    pub fn header_view(&self) -> Result<&T> {
        T::ref_from_bytes(self.header_buf.as_slice())
            .map_err(|e| anyhow!("{}", e.to_string()))
    }

    /// Mutable header view (`&mut T`) backed by `self.header_buf`.
    #[inline]
    pub fn header_view_mut(&mut self) -> Result<&mut T> {
        T::from_bhs_bytes(self.header_buf.as_mut_slice())
    }

    /// Parse PDU: AHS + pad(AHS) + [HeaderDigest?] + Data + pad(Data) +
    /// [DataDigest?], the BHS being already in `header_buf`.
    pub fn parse_with_buff(
        &mut self,
        buf: &[u8],
        enable_header_digest: bool,
        enable_data_digest: bool,
    ) -> Result<()> {
        let tn = type_name::<T>();

        let header = self.header_view().context("parsing without header_buf")?;
        let ahs_len = header.get_ahs_length_bytes();
        let data_len = header.get_data_length_bytes();

        let mut off = 0;
        let need = |end: usize, what: &str| -> Result<()> {
            if buf.len() < end {
                bail!("{tn}: buffer {} too small for {what} end {end}", buf.len());
            }
            Ok(())
        };

        need(off + ahs_len + pad_len(ahs_len), "AHS")?;
        self.additional_header = buf[off..off + ahs_len].to_vec();
        off += ahs_len + pad_len(ahs_len);

        self.header_digest = if enable_header_digest {
            need(off + 4, "HeaderDigest")?;
            let hd = u32::from_be_bytes(
                buf[off..off + 4]
                    .try_into()
                    .context("expected header_digest, but failed to build")?,
            );
            off += 4;
            Some(U32::<BigEndian>::new(hd))
        } else {
            None
        };

        need(off + data_len + pad_len(data_len), "Data")?;
        self.data = buf[off..off + data_len].to_vec();
        off += data_len + pad_len(data_len);

        self.data_digest = if enable_data_digest && data_len > 0 {
            need(off + 4, "DataDigest")?;
            let dd = u32::from_be_bytes(
                buf[off..off + 4]
                    .try_into()
                    .context("expected data_digest, but failed to build")?,
            );
            Some(U32::<BigEndian>::new(dd))
        } else {
            None
        };

        if enable_header_digest {
            let want = compute_header_digest(&self.header_buf, &self.additional_header);
            if self.header_digest.map(|hd| hd.get()) != Some(want) {
                bail!(
                    "{tn}: HeaderDigest mismatch: got={:?}, want={:#010x}",
                    self.header_digest,
                    want
                );
            }
        }
        if enable_data_digest && !self.data.is_empty() {
            let want = compute_data_digest(&self.data);
            if self.data_digest.map(|dd| dd.get()) != Some(want) {
                bail!(
                    "{tn}: DataDigest mismatch: got={:?}, want={:#010x}",
                    self.data_digest,
                    want
                );
            }
        }

        Ok(())
    }
}

impl<T> Builder for PDUWithData<T>
where T: BasicHeaderSegment + FromBytes + ZeroCopyType
{
    type Header = [u8; HEADER_LEN];

    fn append_data(&mut self, more: &[u8]) -> Result<()> {
        self.data.extend_from_slice(more);
        let len = self.data.len() as u32;
        self.header_view_mut()?.set_data_length_bytes(len);
        Ok(())
    }

    fn build(
        &mut self,
        max_recv_data_segment_length: usize,
        enable_header_digest: bool,
        enable_data_digest: bool,
    ) -> Result<(Self::Header, Vec<u8>)> {
        if max_recv_data_segment_length < self.data.len() {
            bail!(
                "MaxRecvDataSegmentLength {max_recv_data_segment_length} is less than \
                 data len: {}",
                self.data.len()
            );
        }

        let data_len = self.data.len() as u32;
        self.header_view_mut()?.set_data_length_bytes(data_len);
        self.seal_digests(enable_header_digest, enable_data_digest);

        let padding_ahs = pad_len(self.additional_header.len());
        let padding_chunk = pad_len(self.data.len());
        let mut body = Vec::with_capacity(
            self.additional_header.len()
                + padding_ahs
                + (self.header_digest.is_some() as usize) * 4
                + self.data.len()
                + padding_chunk
                + (self.data_digest.is_some() as usize) * 4,
        );

        if !self.additional_header.is_empty() {
            body.extend_from_slice(&self.additional_header);
            body.extend(std::iter::repeat_n(0u8, padding_ahs));
        }
        if let Some(hd) = self.header_digest {
            body.extend_from_slice(hd.as_bytes());
        }
        body.extend_from_slice(&self.data);
        body.extend(std::iter::repeat_n(0u8, padding_chunk));
        if let Some(dd) = self.data_digest {
            body.extend_from_slice(dd.as_bytes());
        }

        Ok((self.header_buf, body))
    }
}

struct HexPreview<'a>(&'a [u8]);

impl fmt::Debug for HexPreview<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const MAX: usize = 128;
        let slice = &self.0[..self.0.len().min(MAX)];
        write!(f, "\"")?;
        for (i, b) in slice.iter().enumerate() {
            if i != 0 {
                write!(f, " ")?;
            }
            write!(f, "{b:02x}")?;
        }
        if self.0.len() > MAX {
            write!(f, " ... (+{} bytes)", self.0.len() - MAX)?;
        }
        write!(f, "\"")
    }
}

impl<T> fmt::Debug for PDUWithData<T>
where T: BasicHeaderSegment + FromBytes + fmt::Debug + ZeroCopyType
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ds = f.debug_struct("PDUWithData");
        match self.header_view() {
            Ok(header) => ds.field("header", header),
            Err(_) => ds.field("header_raw", &HexPreview(&self.header_buf)),
        };

        ds.field("data_len", &self.data.len());

        match self.header_digest {
            Some(hd) => ds.field("header_digest", &format_args!("{:#010x}", hd.get())),
            None => ds.field("header_digest", &"None"),
        };
        match self.data_digest {
            Some(dd) => ds.field("data_digest", &format_args!("{:#010x}", dd.get())),
            None => ds.field("data_digest", &"None"),
        };

        if !self.data.is_empty() {
            ds.field("data_preview", &HexPreview(&self.data));
        }
        ds.finish()
    }
}
