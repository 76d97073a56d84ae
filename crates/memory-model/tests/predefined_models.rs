//! Layout, naming and address arithmetic of the predefined memory models.

use memory_model::{
    split_long_address, BankType, ConfigurationError, MemoryModel, PredefinedModel, QueryError,
};
use proptest::prelude::*;
use rstest::rstest;
#[cfg(feature = "serde")]
use serde as _;
use serde_json as _;
use thiserror as _;

fn model(kind: PredefinedModel) -> MemoryModel {
    MemoryModel::predefined(kind).unwrap()
}

fn ranges(model: &MemoryModel) -> Vec<(u16, u16)> {
    model.slot_ranges().iter().map(|r| (r.start, r.end)).collect()
}

#[test]
fn zx16k_has_unused_upper_half() {
    let mm = model(PredefinedModel::Zx16k);
    assert_eq!(mm.name(), "ZX16K");
    assert_eq!(ranges(&mm), vec![(0x0000, 0x3FFF), (0x4000, 0x7FFF), (0x8000, 0xFFFF)]);
    assert_eq!(mm.initial_slots(), &[0, 1, 2]);
    assert_eq!(mm.bank_count(), 3);

    let names: Vec<&str> = (0..3).map(|i| mm.bank(i).unwrap().name.as_str()).collect();
    assert_eq!(names, vec!["ROM", "RAM", "UNUSED"]);
    for index in 0..3 {
        assert_eq!(mm.bank(index).unwrap().short_name, "");
    }
    assert_eq!(mm.bank(0).unwrap().bank_type, BankType::Rom);
    assert_eq!(mm.bank(1).unwrap().bank_type, BankType::Ram);
    assert_eq!(mm.bank(2).unwrap().bank_type, BankType::Unused);

    let banks = mm.memory_banks(&[0, 1]);
    assert_eq!(banks[0].name, "ROM");
    assert_eq!(banks[1].name, "RAM");
    assert_eq!(banks[2].name, "UNASSIGNED");

    let slots = [0, 1, 2];
    assert_eq!(mm.create_long_address(0x0000, &slots), 0x01_0000);
    assert_eq!(mm.create_long_address(0x3FFF, &slots), 0x01_3FFF);
    assert_eq!(mm.create_long_address(0x4000, &slots), 0x02_4000);
    assert_eq!(mm.create_long_address(0x8000, &slots), 0x03_8000);
    assert_eq!(mm.create_long_address(0xFFFF, &slots), 0x03_FFFF);
    assert_eq!(mm.top_of_ram(), 0x8000);
}

#[test]
fn zx48k_is_rom_plus_ram() {
    let mm = model(PredefinedModel::Zx48k);
    assert_eq!(ranges(&mm), vec![(0x0000, 0x3FFF), (0x4000, 0xFFFF)]);
    assert_eq!(mm.initial_slots(), &[0, 1]);
    assert_eq!(mm.bank_count(), 2);
    assert_eq!(mm.bank(1).unwrap().short_name, "");
    assert_eq!(mm.top_of_ram(), 0x1_0000);
    assert_eq!(mm.parse_bank(0x8000, None), Ok(1));
    assert_eq!(mm.bank_for_address(0x02_8000), None);
}

#[test]
fn zx128k_banks_and_names() {
    let mm = model(PredefinedModel::Zx128k);
    assert_eq!(
        ranges(&mm),
        vec![(0x0000, 0x3FFF), (0x4000, 0x7FFF), (0x8000, 0xBFFF), (0xC000, 0xFFFF)]
    );
    assert_eq!(mm.initial_slots(), &[8, 5, 2, 0]);
    assert_eq!(mm.bank_count(), 10);
    for index in 0..8 {
        let bank = mm.bank(index).unwrap();
        assert_eq!(bank.name, format!("BANK{index}"));
        assert_eq!(bank.short_name, index.to_string());
        assert_eq!(bank.bank_type, BankType::Ram);
    }
    assert_eq!(mm.bank(8).unwrap().name, "ROM0");
    assert_eq!(mm.bank(8).unwrap().short_name, "R0");
    assert_eq!(mm.bank(9).unwrap().short_name, "R1");
    assert_eq!(mm.bank(9).unwrap().bank_type, BankType::Rom);
    assert_eq!(mm.slot_ranges()[0].name.as_deref(), Some("slotROM"));
    assert_eq!(mm.slot_ranges()[3].name.as_deref(), Some("slotC000"));
    assert!(mm.io_mmu().contains("slotC000 = portValue & 0x07;"));

    let banks = mm.memory_banks(&[9, 7, 6, 5]);
    let names: Vec<&str> = banks.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["ROM1", "BANK7", "BANK6", "BANK5"]);
}

#[test]
fn zx128k_bank_parsing() {
    let mm = model(PredefinedModel::Zx128k);
    assert_eq!(mm.parse_bank(0x0000, Some("R1")), Ok(9));
    assert_eq!(mm.parse_bank(0xC000, Some("7")), Ok(7));
    assert_eq!(mm.parse_bank(0x4000, None), Ok(5));
    assert_eq!(mm.parse_bank(0x8000, Some("2")), Ok(2));
    assert_eq!(
        mm.parse_bank(0x4000, Some("R0")),
        Err(QueryError::Unreachable {
            name: "R0".to_string(),
            addr: 0x4000
        })
    );
    assert_eq!(mm.parse_bank(0xC000, None), Err(QueryError::AmbiguousBank(0xC000)));
    assert_eq!(mm.bank_for_address(0x06_4000), None);
    assert_eq!(mm.bank_for_address(0x04_C000), Some(3));
    assert_eq!(mm.bank_short_name_for_address(0x0A_0000), Some("R1"));
    assert_eq!(mm.bank_name_for_address(0x0A_0000), Some("ROM1"));
}

#[test]
fn zx_next_two_rom_layout() {
    let mm = model(PredefinedModel::ZxNextTwoRom);
    assert_eq!(mm.name(), "ZXNEXT");
    assert_eq!(mm.slot_ranges().len(), 8);
    assert_eq!(mm.initial_slots(), &[0xFE, 0xFF, 10, 11, 4, 5, 0, 1]);
    assert_eq!(mm.bank_count(), 256);
    assert_eq!(mm.bank(253).unwrap().name, "BANK253");
    assert_eq!(mm.bank(253).unwrap().short_name, "253");
    assert_eq!(mm.bank(0xFC).unwrap().name, "ROM0");
    assert_eq!(mm.bank(0xFD).unwrap().short_name, "R0");
    assert_eq!(mm.bank(0xFF).unwrap().rom_offset, 0x2000);
    assert_eq!(mm.bank(0xFF).unwrap().bank_type, BankType::Rom);
    assert!(!mm.io_mmu().is_empty());

    assert_eq!(mm.parse_bank(0x0000, Some("R0")), Ok(0xFC));
    assert_eq!(mm.parse_bank(0x2000, Some("R0")), Ok(0xFD));
    assert_eq!(mm.parse_bank(0x1FFF, Some("R1")), Ok(0xFE));
    assert_eq!(mm.parse_bank(0x3000, Some("R1")), Ok(0xFF));
    assert_eq!(mm.parse_bank(0x4000, Some("223")), Ok(223));
    assert_eq!(mm.parse_bank(0x4000, Some("R1")), Ok(0xFF));
    assert!(mm.parse_bank(0x6000, Some("R1")).is_err());
}

#[test]
fn zx_next_one_rom_shares_short_name() {
    let mm = model(PredefinedModel::ZxNextOneRom);
    assert_eq!(mm.bank(254).unwrap().name, "ROM");
    assert_eq!(mm.bank(254).unwrap().short_name, "R");
    assert_eq!(mm.bank(255).unwrap().short_name, "R");
    assert_eq!(mm.io_mmu(), "");
    assert_eq!(mm.parse_bank(0x0100, Some("R")), Ok(0xFE));
    assert_eq!(mm.parse_bank(0x2100, Some("R")), Ok(0xFF));

    let banks = mm.memory_banks(&[254, 255, 6, 5, 3, 0, 251, 6]);
    let names: Vec<&str> = banks.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["ROM", "ROM", "BANK6", "BANK5", "BANK3", "BANK0", "BANK251", "BANK6"]
    );
}

#[rstest]
#[case(PredefinedModel::Zx81K1, 0x43FF, 0x4400)]
#[case(PredefinedModel::Zx81K2, 0x47FF, 0x4800)]
#[case(PredefinedModel::Zx81K16, 0x7FFF, 0x8000)]
#[case(PredefinedModel::Zx81K32, 0x7FFF, 0xC000)]
#[case(PredefinedModel::Zx81K48, 0x7FFF, 0x1_0000)]
#[case(PredefinedModel::Zx81K56, 0x7FFF, 0x1_0000)]
fn zx81_ram_packs(#[case] kind: PredefinedModel, #[case] stack: u16, #[case] top: u32) {
    let mm = model(kind);
    assert_eq!(mm.default_top_of_stack(), Some(stack));
    assert_eq!(mm.top_of_ram(), top);
    assert_eq!(mm.bank(0).unwrap().name, "ROM");
    assert_eq!(mm.bank(1).unwrap().name, "RAM");
}

#[test]
fn zx81_56k_fills_gap_above_rom() {
    let mm = model(PredefinedModel::Zx81K56);
    assert_eq!(ranges(&mm), vec![(0x0000, 0x1FFF), (0x2000, 0xFFFF)]);
    let mm = model(PredefinedModel::Zx81K1);
    assert_eq!(
        ranges(&mm),
        vec![(0x0000, 0x1FFF), (0x2000, 0x3FFF), (0x4000, 0x43FF), (0x4400, 0xFFFF)]
    );
}

#[test]
fn colecovision_fills_gaps() {
    let mm = model(PredefinedModel::ColecoVision);
    assert_eq!(mm.name(), "ColecoVision");
    assert_eq!(
        ranges(&mm),
        vec![
            (0x0000, 0x1FFF),
            (0x2000, 0x5FFF),
            (0x6000, 0x6FFF),
            (0x7000, 0x73FF),
            (0x7400, 0x7FFF),
            (0x8000, 0xFFFF)
        ]
    );
    assert_eq!(mm.initial_slots(), &[0, 1, 4, 2, 5, 3]);
    assert_eq!(mm.bank(3).unwrap().name, "Cartridge ROM");
    assert_eq!(mm.bank(3).unwrap().short_name, "");
    assert_eq!(mm.bank(4).unwrap().bank_type, BankType::Unused);
    assert_eq!(mm.top_of_ram(), 0x7400);
}

#[test]
fn unknown_and_all_ram() {
    let unknown = model(PredefinedModel::Unknown);
    assert_eq!(unknown.bank(0).unwrap().name, "UNKNOWN");
    assert_eq!(unknown.bank(0).unwrap().bank_type, BankType::Unknown);
    assert_eq!(unknown.top_of_ram(), 0);

    let ram = model(PredefinedModel::AllRam);
    assert_eq!(ram.name(), "RAM");
    assert_eq!(ram.initial_long_address(0x8000), 0x01_8000);
    assert_eq!(ram.top_of_ram(), 0x1_0000);
}

#[test]
fn from_name_selects_models() {
    assert_eq!(MemoryModel::from_name("zx128k", None).unwrap().name(), "ZX128K");
    assert_eq!(
        MemoryModel::from_name("ZXNEXT", None).unwrap().kind(),
        PredefinedModel::ZxNextTwoRom
    );
    assert_eq!(
        MemoryModel::from_name("CUSTOM", None).unwrap_err(),
        ConfigurationError::MissingCustomMemory
    );
    assert_eq!(
        MemoryModel::from_name("ZX99", None).unwrap_err().to_string(),
        "Unknown memory model: 'ZX99'."
    );
}

proptest! {
    #[test]
    fn long_address_round_trips_in_every_model(
        addr in any::<u16>(),
        pick in any::<prop::sample::Index>(),
    ) {
        for kind in PredefinedModel::ALL {
            let mm = model(kind);
            let reachable: Vec<usize> = mm.banks_reachable_from(addr).iter().copied().collect();
            let bank = reachable[pick.index(reachable.len())];
            let mut slots = mm.initial_slots().to_vec();
            slots[mm.slot_index_for_address(addr)] = bank;
            let long_addr = mm.create_long_address(addr, &slots);
            prop_assert_eq!(split_long_address(long_addr), (addr, Some(bank)));
        }
    }

    #[test]
    fn implicit_bank_resolves_for_unbanked_slots(addr in any::<u16>()) {
        for kind in PredefinedModel::ALL {
            let mm = model(kind);
            if mm.banks_reachable_from(addr).len() == 1 {
                prop_assert!(mm.parse_bank(addr, Some("")).is_ok());
                prop_assert!(mm.parse_bank(addr, None).is_ok());
            }
        }
    }
}
