use std::collections::HashMap;
use std::net::SocketAddr;

use crate::config::ConfigError;
use crate::config::ShutdownConfig;
use crate::config::listen_address;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
        .collect();

    move |name| vars.get(name).cloned()
}

#[test]
fn test_defaults() {
    let config = ShutdownConfig::from_lookup(&lookup(&[])).unwrap();

    assert!(!config.enabled);
    assert_eq!(30, config.timeout_seconds);
    assert_eq!(ShutdownConfig::default(), config);
}

#[test]
fn test_enabled_with_timeout() {
    let config = ShutdownConfig::from_lookup(&lookup(&[
        ("GRACEFUL_SHUTDOWN_ENABLED", "true"),
        ("GRACEFUL_SHUTDOWN_TIMEOUT", "45"),
    ]))
    .unwrap();

    assert!(config.enabled);
    assert_eq!(45, config.timeout_seconds);
    assert_eq!(45, config.timeout().as_secs());
}

#[test]
fn test_empty_values_use_defaults() {
    let config = ShutdownConfig::from_lookup(&lookup(&[
        ("GRACEFUL_SHUTDOWN_ENABLED", ""),
        ("GRACEFUL_SHUTDOWN_TIMEOUT", "  "),
    ]))
    .unwrap();

    assert_eq!(ShutdownConfig::default(), config);
}

#[test]
fn test_invalid_values() {
    let result =
        ShutdownConfig::from_lookup(&lookup(&[("GRACEFUL_SHUTDOWN_ENABLED", "yes please")]));
    let Err(ConfigError::Invalid { name, value, .. }) = result else {
        panic!("Expected invalid config");
    };
    assert_eq!("GRACEFUL_SHUTDOWN_ENABLED", name);
    assert_eq!("yes please", value);

    // no negative budgets
    let result = ShutdownConfig::from_lookup(&lookup(&[("GRACEFUL_SHUTDOWN_TIMEOUT", "-1")]));
    assert!(result.is_err());
    assert!(
        result
            .unwrap_err()
            .to_string()
            .contains("GRACEFUL_SHUTDOWN_TIMEOUT")
    );
}

#[test]
fn test_listen_address() {
    let default_address: SocketAddr = "0.0.0.0:6000".parse().unwrap();
    assert_eq!(default_address, listen_address(&lookup(&[])).unwrap());

    let address = listen_address(&lookup(&[("ADDRESS", "127.0.0.1:8080")])).unwrap();
    assert_eq!("127.0.0.1:8080".parse::<SocketAddr>().unwrap(), address);

    let address =
        listen_address(&lookup(&[("ADDRESS", "127.0.0.1:8080"), ("PORT", "9000")])).unwrap();
    assert_eq!("127.0.0.1:9000".parse::<SocketAddr>().unwrap(), address);

    assert!(listen_address(&lookup(&[("PORT", "not a port")])).is_err());
    assert!(listen_address(&lookup(&[("ADDRESS", "localhost")])).is_err());
}
