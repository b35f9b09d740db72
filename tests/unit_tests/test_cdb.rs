// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::collections::HashSet;

use anyhow::Result;
use hex_literal::hex;
use iscsi_target_core::control_block::{
    Cdb, CdbKind,
    common::{
        CommandDescriptorBlock, Control, GroupNumber, PageCode, PageControl, ProtocolError,
        RwFlags,
    },
    inquiry::{Inquiry, VpdPage},
    mod_sense::{ModeSense6, ModeSense10},
    mode_select::{ModeSelect6, ModeSelect10},
    read::{Read6, Read10, Read12, Read16},
    read_capacity::{ReadCapacity10, ReadCapacity16},
    report_luns::ReportLuns,
    request_sense::RequestSense,
    test_unit_ready::TestUnitReady,
    write::{Write6, Write10, Write12, Write16},
};

/// One instance of every variant with the flag and control bits set.
fn every_variant() -> Result<Vec<Cdb>> {
    let linked = Control::new(true, false);
    let naca = Control::new(false, true);
    let both = Control::new(true, true);
    let flags = RwFlags::new(0b101, true, false, true)?;
    let group = GroupNumber::new(0x1A)?;

    let mut read6 = Read6::new(0x1F_FFFF, 0)?;
    read6.control = linked;
    let mut write6 = Write6::new(0x01_2345, 17)?;
    write6.control = both;

    Ok(vec![
        Cdb::TestUnitReady(TestUnitReady { control: naca }),
        Cdb::RequestSense(RequestSense {
            desc: true,
            allocation_length: 252,
            control: linked,
        }),
        Cdb::Read6(read6),
        Cdb::Write6(write6),
        Cdb::Inquiry(Inquiry {
            control: both,
            ..Inquiry::vpd(VpdPage::UnitSerial, 0x1234)
        }),
        Cdb::ModeSelect6(ModeSelect6 {
            control: naca,
            ..ModeSelect6::new(true, true, 0xFE)
        }),
        Cdb::ModeSense6(ModeSense6 {
            dbd: false,
            page_control: PageControl::Default,
            page_code: PageCode::new(0x0A)?,
            subpage_code: 0xFF,
            allocation_length: 0xC0,
            control: linked,
        }),
        Cdb::ReadCapacity10(ReadCapacity10 {
            lba: 0xFFFF_FFFE,
            pmi: true,
            control: both,
        }),
        Cdb::Read10(Read10 {
            flags,
            group_number: group,
            control: naca,
            ..Read10::new(0x0001_2345, 8)
        }),
        Cdb::Write10(Write10 {
            flags: RwFlags::new(0b111, false, true, false)?,
            group_number: GroupNumber::new(1)?,
            control: linked,
            ..Write10::new(0xCAFE_F00D, 0xFFFF)
        }),
        Cdb::ModeSelect10(ModeSelect10 {
            control: both,
            ..ModeSelect10::new(false, true, 0x1_00)
        }),
        Cdb::ModeSense10(ModeSense10 {
            llbaa: true,
            dbd: true,
            page_control: PageControl::Saved,
            page_code: PageCode::new(0x3F)?,
            subpage_code: 0x01,
            allocation_length: 0x200,
            control: naca,
        }),
        Cdb::Read16(Read16 {
            flags,
            group_number: group,
            control: both,
            ..Read16::new(0x0102_0304_0506_0708, 0x10)
        }),
        Cdb::Write16(Write16 {
            flags: RwFlags::new(0, true, true, true)?,
            group_number: GroupNumber::new(GroupNumber::MAX)?,
            control: linked,
            ..Write16::new(u64::MAX - 1, u32::MAX)
        }),
        Cdb::ReadCapacity16(ReadCapacity16 {
            lba: 0x0000_0001_0000_0000,
            pmi: true,
            control: naca,
            ..ReadCapacity16::new(32)
        }),
        Cdb::ReportLuns(ReportLuns {
            control: both,
            ..ReportLuns::new(0x02, 0x0001_0000)
        }),
        Cdb::Read12(Read12 {
            flags,
            group_number: group,
            control: linked,
            ..Read12::new(0xDEAD_BEEF, 0x0010_0000)
        }),
        Cdb::Write12(Write12 {
            flags: RwFlags::new(0b010, false, false, true)?,
            group_number: GroupNumber::new(0x05)?,
            control: naca,
            ..Write12::new(0xDEAD_BEEF, 0x100)
        }),
    ])
}

#[test]
fn test_cdb_roundtrip_through_dispatch() -> Result<()> {
    let cdbs = every_variant()?;
    let kinds: HashSet<CdbKind> = cdbs.iter().map(Cdb::kind).collect();
    assert_eq!(kinds.len(), 18, "every variant covered once");

    for cdb in cdbs {
        let raw = cdb.encode();
        assert_eq!(raw.len(), cdb.size(), "{:?}", cdb.kind());
        assert_eq!(raw[0], cdb.operation_code());
        assert_eq!(raw[raw.len() - 1], cdb.control().raw(), "{:?}", cdb.kind());
        let decoded = Cdb::decode(&mut raw.clone())?;
        assert_eq!(decoded, cdb);
    }
    Ok(())
}

#[test]
fn test_control_and_flag_bits_on_the_wire() -> Result<()> {
    let read10 = Read10 {
        flags: RwFlags::new(0b101, true, false, true)?,
        group_number: GroupNumber::new(0x1A)?,
        control: Control::new(true, true),
        ..Read10::new(0x0001_2345, 8)
    };
    assert_eq!(
        &read10.encode()[..],
        &hex!("28 B2 00 01 23 45 1A 00 08 05")
    );

    let sense = ModeSense10 {
        llbaa: true,
        page_control: PageControl::Saved,
        ..ModeSense10::simple(0x3F, 0x200)
    };
    let raw = sense.encode();
    assert_eq!(raw[1], 0x18, "LLBAA | DBD");
    assert_eq!(raw[2], 0xFF, "PC=11b, page 0x3F");
    Ok(())
}

#[test]
fn test_read6_zero_length_means_256_blocks() -> Result<()> {
    let cdb = Cdb::Read6(Read6::new(7, 0)?);
    assert_eq!(cdb.block_transfer(), Some((7, 256)));
    assert!(!cdb.is_write());
    Ok(())
}

#[test]
fn test_read6_lba_overflow_rejected() {
    let err = Read6::new(0x20_0000, 1).expect_err("21-bit LBA");
    assert_eq!(err.field, "READ(6) LBA");
    assert_eq!(err.value, 0x20_0000);
    assert!(Write6::new(0x20_0000, 1).is_err());
}

#[test]
fn test_mode_select6_layout() {
    let raw = ModeSelect6::new(true, false, 24).encode();
    assert_eq!(&raw[..], &hex!("15 10 00 00 18 00"));

    let raw = ModeSelect6::new(true, true, 0).encode();
    assert_eq!(raw[1], 0x11);
}

#[test]
fn test_read16_layout() {
    let raw = Read16::new(0x0102_0304_0506_0708, 0x10).encode();
    assert_eq!(
        &raw[..],
        &hex!("88 00 01 02 03 04 05 06 07 08 00 00 00 10 00 00")
    );
}

#[test]
fn test_opcode_mismatch() {
    let raw = hex!("2A 00 00 00 00 10 00 00 01 00");
    let err = Read10::decode(&mut &raw[..]).expect_err("WRITE(10) bytes");
    assert_eq!(
        err,
        ProtocolError::InvalidOperationCode {
            expected: 0x28,
            found: 0x2A
        }
    );
}

#[test]
fn test_truncated_cdb() {
    let raw = hex!("88 00 00");
    let err = Read16::decode(&mut &raw[..]).expect_err("3 of 16 bytes");
    assert_eq!(err, ProtocolError::Truncated { need: 16, got: 3 });
}

#[test]
fn test_read_capacity16_service_action_checked() {
    let mut raw = ReadCapacity16::new(32).to_padded();
    raw[1] = 0x11;
    let err = Cdb::from_padded(&raw).expect_err("wrong service action");
    assert_eq!(
        err,
        ProtocolError::InvalidServiceAction {
            expected: 0x10,
            found: 0x11
        }
    );
}

#[test]
fn test_unsupported_operation_code() {
    let raw = [0xFFu8; 16];
    assert_eq!(
        Cdb::from_padded(&raw),
        Err(ProtocolError::UnsupportedOperationCode(0xFF))
    );
}

#[test]
fn test_padded_inquiry_decodes() -> Result<()> {
    let raw = Inquiry::standard(36).to_padded();
    let cdb = Cdb::from_padded(&raw)?;
    assert_eq!(cdb.kind(), CdbKind::Inquiry);
    assert_eq!(cdb.block_transfer(), None);
    Ok(())
}
