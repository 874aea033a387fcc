//! This module walks a proxy and its implementations through a deployment and
//! a series of upgrades, checking the initializer guard at every step.
#![cfg(test)]

use storage_layout_planner::{
    error::{self, proxy::Error},
    proxy::{Initializer, InitializerState},
    utility::Address,
    ProxyStorage,
};

fn implementation(byte: u8) -> Address {
    Address([byte; 20])
}

#[test]
fn rejects_a_second_unchained_initialize() -> anyhow::Result<()> {
    let mut proxy = ProxyStorage::new();
    proxy.begin_initialize()?;

    assert_eq!(
        proxy.begin_initialize(),
        Err(Error::ReentrantInitialization {
            active:    1,
            requested: 1,
        })
    );
    assert!(proxy.initializing());

    Ok(())
}

#[test]
fn deploys_and_upgrades_through_a_proxy() -> anyhow::Result<()> {
    // The implementation locks its own storage on deployment.
    let mut logic_v1 = Initializer::new();
    logic_v1.disable_initializers(true)?;
    assert!(logic_v1.begin_initialize().is_err());

    // The proxy runs the initializer against its own storage instead, with the
    // parent initializer chaining into the ones it inherits from.
    let mut proxy = ProxyStorage::new();
    proxy.set_admin(implementation(0xad))?;
    proxy.upgrade_to(implementation(0x01))?;
    proxy.begin_initialize()?;
    proxy.begin_nested_initialize(1)?;
    proxy.finish_initialize()?;
    assert!(proxy.initializing());
    assert_eq!(
        proxy.finish_initialize()?,
        InitializerState::Initialized { version: 1 }
    );

    // Disabling initializers through the proxy is not allowed.
    assert_eq!(proxy.disable_initializers(false), Err(Error::InvalidDisableContext));

    // Upgrading to a second version that needs its own setup.
    let previous = proxy.upgrade_to(implementation(0x02))?;
    assert_eq!(previous, Some(implementation(0x01)));
    proxy.begin_reinitialize(2)?;
    proxy.finish_initialize()?;
    assert_eq!(proxy.initialized(), 2);

    // Replaying the old reinitializer must fail.
    assert!(matches!(
        proxy.begin_reinitialize(2),
        Err(Error::AlreadyInitialized { .. })
    ));
    assert_eq!(proxy.admin(), Some(implementation(0xad)));

    Ok(())
}

#[test]
fn failed_transitions_leave_the_proxy_untouched() -> anyhow::Result<()> {
    let mut proxy = ProxyStorage::new();
    proxy.upgrade_to(implementation(0x01))?;
    proxy.begin_initialize()?;
    proxy.finish_initialize()?;

    let snapshot = proxy.clone();
    assert!(proxy.begin_initialize().is_err());
    assert!(proxy.begin_reinitialize(1).is_err());
    assert!(proxy.finish_initialize().is_err());
    assert!(proxy.disable_initializers(true).is_err());
    assert!(proxy.upgrade_to(Address::ZERO).is_err());
    assert_eq!(proxy, snapshot);

    Ok(())
}

#[test]
fn proxy_errors_lift_into_the_interface_error() {
    let mut proxy = ProxyStorage::new();
    let result: error::Result<()> = proxy.set_beacon(Address::ZERO).map_err(Into::into);

    let message = result.err().map(|e| e.to_string());
    assert_eq!(message.as_deref(), Some("The zero address is not a valid beacon"));
}
