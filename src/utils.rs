use std::str::FromStr;

use crate::config::ConfigError;

/// Get the value of a variable from a lookup, parsed into `T`
///
/// Only when:
/// - It is set
/// - It is not empty
///
/// Otherwise `None` is returned so the caller can fall back to its default.
///
/// # Errors
///
/// Will return `Err` when the value is set but can not be parsed
pub fn parse_var<T, L>(lookup: &L, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
    L: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(name) else {
        return Ok(None);
    };

    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    value
        .parse::<T>()
        .map(Some)
        .map_err(|err| ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: err.to_string(),
        })
}

/// Lookup a variable in the process environment
pub fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
