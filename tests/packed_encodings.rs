//! This module tests that the planner packs declarations into slots exactly as
//! the Solidity compiler does.
#![cfg(test)]

use ethnum::U256;
use storage_layout_planner::{
    hash::{keccak, SlotHasher},
    layout::{Config, Planner, TypeDescriptor},
    slot::{ArrayKind, MappingKey},
    utility::Address,
    SlotCalculator,
};

mod common;

#[test]
fn packs_two_uint128s_into_one_slot() -> anyhow::Result<()> {
    let layout = common::plan_fields(vec![
        ("a", TypeDescriptor::uint(128)),
        ("b", TypeDescriptor::uint(128)),
    ])?;

    assert_eq!(layout.len(), 2);
    assert!(layout.has_assignment("a", 0usize, 0, 16));
    assert!(layout.has_assignment("b", 0usize, 16, 16));
    assert_eq!(layout.slots_used(), U256::ONE);

    Ok(())
}

#[test]
fn packs_mixed_widths_low_byte_first() -> anyhow::Result<()> {
    let layout = common::plan_fields(vec![
        ("a", TypeDescriptor::uint(8)),
        ("b", TypeDescriptor::bool()),
        ("c", TypeDescriptor::uint(16)),
        ("d", TypeDescriptor::uint(256)),
    ])?;

    assert!(layout.has_assignment("a", 0usize, 0, 1));
    assert!(layout.has_assignment("b", 0usize, 1, 1));
    assert!(layout.has_assignment("c", 0usize, 2, 2));
    assert!(layout.has_assignment("d", 1usize, 0, 32));

    Ok(())
}

#[test]
fn locates_dynamic_array_elements() -> anyhow::Result<()> {
    let layout = common::plan_fields(vec![(
        "arr",
        TypeDescriptor::dynamic_array(TypeDescriptor::uint(256)),
    )])?;
    assert!(layout.has_assignment("arr", 0usize, 0, 32));

    let calculator = SlotCalculator::default();
    let data = keccak().hash(&[0u8; 32]);
    assert_eq!(calculator.dynamic_array_data_slot(0usize), data);

    assert_eq!(calculator.array_element_slot(data, 0usize, ArrayKind::Fixed), data);
    assert_eq!(
        calculator.array_element_slot(data, 1usize, ArrayKind::Fixed),
        data + U256::ONE
    );
    assert_eq!(
        calculator.array_element_slot(0usize, 1usize, ArrayKind::Dynamic),
        data + U256::ONE
    );

    Ok(())
}

#[test]
fn locates_mapping_values_of_a_planned_layout() -> anyhow::Result<()> {
    let layout = common::plan_from_file("token_v1")?;
    let balances = layout
        .get("balances")
        .ok_or_else(|| anyhow::anyhow!("balances not planned"))?;
    assert_eq!(balances.slot(), U256::from(2u8));

    let holder: Address = "0x00000000000000000000000000000000000000aa".parse()?;
    let calculator = SlotCalculator::default();
    let slot = calculator.mapping_value_slot(balances.slot(), &MappingKey::from(holder));

    let mut preimage = [0u8; 64];
    preimage[31] = 0xaa;
    preimage[63] = 2;
    assert_eq!(slot, keccak().hash(&preimage));

    Ok(())
}

#[test]
fn plans_a_token_from_json() -> anyhow::Result<()> {
    let layout = common::plan_from_file("token_v1")?;

    assert!(layout.has_assignment("owner", 0usize, 0, 20));
    assert!(layout.has_assignment("paused", 0usize, 20, 1));
    assert!(layout.has_assignment("totalSupply", 1usize, 0, 32));
    assert!(layout.has_assignment("balances", 2usize, 0, 32));
    assert!(layout.has_assignment("name", 3usize, 0, 32));
    assert_eq!(layout.slots_used(), U256::from(4u8));

    Ok(())
}

#[test]
fn plans_structs_and_packed_arrays_from_json() -> anyhow::Result<()> {
    let layout = common::plan_from_file("vault")?;

    assert!(layout.has_assignment("config.asset", 0usize, 0, 20));
    assert!(layout.has_assignment("config.feeBps", 0usize, 20, 2));
    assert!(layout.has_assignment("config.cap", 1usize, 0, 32));

    assert!(layout.has_assignment("epochs[0]", 2usize, 0, 8));
    assert!(layout.has_assignment("epochs[3]", 2usize, 24, 8));
    assert!(layout.has_assignment("epochs[4]", 3usize, 0, 8));

    assert!(layout.has_assignment("depositors", 4usize, 0, 32));
    assert!(layout.has_assignment("locked", 5usize, 0, 1));
    assert_eq!(layout.slots_used(), U256::from(6u8));

    Ok(())
}

#[test]
fn collapsed_arrays_keep_the_same_footprint() -> anyhow::Result<()> {
    let declarations = common::load_declarations("vault")?;
    let expanded = Planner::default().plan(&declarations)?;
    let collapsed =
        Planner::new(Config::default().with_expand_fixed_arrays(false)).plan(&declarations)?;

    assert!(collapsed.has_assignment("epochs", 2usize, 0, 32));
    assert!(collapsed.get("epochs[0]").is_none());
    assert_eq!(collapsed.get("locked"), expanded.get("locked"));
    assert_eq!(collapsed.slots_used(), expanded.slots_used());

    Ok(())
}
