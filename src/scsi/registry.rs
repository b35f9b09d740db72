// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! Read-only lookup tables consulted by MODE SENSE / MODE SELECT and INQUIRY.
//! Built once per logical unit and shared by `Arc`.

use std::collections::BTreeMap;

use bytes::{BufMut, Bytes, BytesMut};

use crate::{cfg::config::TargetConfig, control_block::inquiry::VpdPage};

pub const CACHING_PAGE: u8 = 0x08;
pub const CONTROL_PAGE: u8 = 0x0A;

/// Mode pages keyed by page code; each value is the full page starting with
/// the PAGE CODE byte.
#[derive(Debug, Clone)]
pub struct ModePageRegistry {
    pages: BTreeMap<u8, Bytes>,
}

impl Default for ModePageRegistry {
    /// Caching page (write cache disabled) and control page.
    fn default() -> Self {
        let mut caching = vec![0u8; 20];
        caching[0] = CACHING_PAGE;
        caching[1] = 0x12;

        let mut control = vec![0u8; 12];
        control[0] = CONTROL_PAGE;
        control[1] = 0x0A;
        // QUEUE ALGORITHM MODIFIER = unrestricted reordering
        control[3] = 0x10;

        Self::new([(CACHING_PAGE, caching), (CONTROL_PAGE, control)])
    }
}

impl ModePageRegistry {
    pub fn new(pages: impl IntoIterator<Item = (u8, Vec<u8>)>) -> Self {
        Self {
            pages: pages
                .into_iter()
                .map(|(code, page)| (code & 0x3F, Bytes::from(page)))
                .collect(),
        }
    }

    pub fn get(&self, page_code: u8) -> Option<&Bytes> {
        self.pages.get(&page_code)
    }

    #[inline]
    pub fn contains(&self, page_code: u8) -> bool {
        self.pages.contains_key(&page_code)
    }

    /// Every page in ascending page-code order.
    pub fn pages(&self) -> impl Iterator<Item = &Bytes> {
        self.pages.values()
    }
}

/// Standard INQUIRY data and VPD pages.
#[derive(Debug, Clone)]
pub struct InquiryDataRegistry {
    standard: Bytes,
    vpd: BTreeMap<u8, Bytes>,
}

fn put_padded(out: &mut BytesMut, s: &str, width: usize) {
    let raw = s.as_bytes();
    let n = raw.len().min(width);
    out.put_slice(&raw[..n]);
    out.put_bytes(b' ', width - n);
}

fn vpd_page(code: u8, payload: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(4 + payload.len());
    out.put_u8(0x00); // connected direct-access block device
    out.put_u8(code);
    out.put_u16(payload.len() as u16);
    out.put_slice(payload);
    out.freeze()
}

impl InquiryDataRegistry {
    pub const STANDARD_LEN: usize = 36;

    pub fn from_target(target: &TargetConfig) -> Self {
        let mut std = BytesMut::with_capacity(Self::STANDARD_LEN);
        std.put_u8(0x00); // PQ=0, direct-access block device
        std.put_u8(0x00); // not removable
        std.put_u8(0x06); // SPC-4
        std.put_u8(0x02); // response data format 2
        std.put_u8((Self::STANDARD_LEN - 5) as u8);
        std.put_u8(0x00);
        std.put_u8(0x00);
        std.put_u8(0x02); // CmdQue
        put_padded(&mut std, &target.vendor_id, 8);
        put_padded(&mut std, &target.product_id, 16);
        put_padded(&mut std, &target.product_revision, 4);

        let serial = format!("{:08X}", crc32c::crc32c(target.target_name.as_bytes()));
        let supported = [VpdPage::SupportedPages.into(), VpdPage::UnitSerial.into()];

        let mut vpd = BTreeMap::new();
        vpd.insert(
            VpdPage::SupportedPages.into(),
            vpd_page(VpdPage::SupportedPages.into(), &supported),
        );
        vpd.insert(
            VpdPage::UnitSerial.into(),
            vpd_page(VpdPage::UnitSerial.into(), serial.as_bytes()),
        );

        Self {
            standard: std.freeze(),
            vpd,
        }
    }

    #[inline]
    pub fn standard(&self) -> &Bytes {
        &self.standard
    }

    pub fn vpd(&self, page_code: u8) -> Option<&Bytes> {
        self.vpd.get(&page_code)
    }
}
