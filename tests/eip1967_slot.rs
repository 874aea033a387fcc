//! This module provides integration tests ensuring that the fixed proxy slots
//! derived by the library match the values published in EIP-1967.
#![cfg(test)]

use ethnum::U256;
use storage_layout_planner::{
    constant::{
        EIP1967_ADMIN_LABEL,
        EIP1967_ADMIN_SLOT_HEX,
        EIP1967_BEACON_LABEL,
        EIP1967_BEACON_SLOT_HEX,
        EIP1967_IMPLEMENTATION_LABEL,
        EIP1967_IMPLEMENTATION_SLOT_HEX,
    },
    hash::{keccak, SlotHasher},
    layout::TypeDescriptor,
    ProxyStorage,
    SlotCalculator,
};

mod common;

#[test]
fn derives_the_implementation_slot() -> anyhow::Result<()> {
    let calculator = SlotCalculator::default();
    assert_eq!(
        calculator.eip1967_slot(EIP1967_IMPLEMENTATION_LABEL),
        U256::from_str_hex("0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc")?
    );

    Ok(())
}

#[test]
fn derives_all_published_slots() -> anyhow::Result<()> {
    let calculator = SlotCalculator::default();
    let vectors = [
        (EIP1967_IMPLEMENTATION_LABEL, EIP1967_IMPLEMENTATION_SLOT_HEX),
        (EIP1967_ADMIN_LABEL, EIP1967_ADMIN_SLOT_HEX),
        (EIP1967_BEACON_LABEL, EIP1967_BEACON_SLOT_HEX),
    ];

    for (label, expected) in vectors {
        let slot = calculator.eip1967_slot(label);
        assert_eq!(slot, U256::from_str_hex(expected)?, "wrong slot for {label}");

        // The slot sits exactly one below the hash of its label.
        assert_eq!(slot + U256::ONE, keccak().hash(label.as_bytes()));
    }

    Ok(())
}

#[test]
fn proxy_reads_back_its_fixed_slots() -> anyhow::Result<()> {
    let proxy = ProxyStorage::new();
    assert_eq!(proxy.implementation_slot(), U256::from_str_hex(EIP1967_IMPLEMENTATION_SLOT_HEX)?);
    assert_eq!(proxy.admin_slot(), U256::from_str_hex(EIP1967_ADMIN_SLOT_HEX)?);
    assert_eq!(proxy.beacon_slot(), U256::from_str_hex(EIP1967_BEACON_SLOT_HEX)?);

    Ok(())
}

#[test]
fn large_sequential_layouts_stay_clear_of_proxy_slots() -> anyhow::Result<()> {
    let layout = common::plan_fields(vec![
        ("owner", TypeDescriptor::address()),
        ("table", TypeDescriptor::fixed_array(TypeDescriptor::uint(256), 4096)),
        (
            "nested",
            TypeDescriptor::mapping(
                TypeDescriptor::uint(256),
                TypeDescriptor::mapping(TypeDescriptor::address(), TypeDescriptor::uint(256)),
            ),
        ),
    ])?;

    assert!(ProxyStorage::new().check_layout(&layout).is_empty());

    Ok(())
}
