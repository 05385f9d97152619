use std::any::Any;
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr};
use std::ops::RangeInclusive;
use std::str::FromStr;

use crate::config::ConfigError;

pub const PORT: &str = "PORT";

pub const DEFAULT_PORT: u16 = 3000;

pub const BIND_ADDR: &str = "BIND_ADDR";

pub const DEFAULT_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0));

pub const DEFAULT_DB_PORT: u16 = 5432;

pub const DEFAULT_MAIL_PORT: u16 = 587;

/// Sundays at noon
pub const DEFAULT_CRON: &str = "0 12 * * 0";

pub const DEFAULT_REPORT_DIR: &str = "reports";

pub const DEFAULT_WINDOW_DAYS: u32 = 7;

/// A century of samples is the longest window we look back over
pub const MAX_WINDOW_DAYS: u32 = 36_500;

pub const DEFAULT_ROW_CAP: usize = 400;

/// Source of configuration values, usually `std::env::var`
pub trait Lookup {
    fn get(&self, key: &str) -> Option<String>;
}

impl<F> Lookup for F
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        // `KEY=` in a .env file means unset
        (self)(key).filter(|value| !value.trim().is_empty())
    }
}

/// Read the process environment
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

pub fn required(lookup: &impl Lookup, key: &'static str) -> Result<String, ConfigError> {
    lookup.get(key).ok_or(ConfigError::Missing(key))
}

pub fn optional(lookup: &impl Lookup, key: &'static str) -> Option<String> {
    lookup.get(key)
}

/// Parse `key` if set, otherwise use `default`
pub fn parsed_or<T>(lookup: &impl Lookup, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup.get(key) {
        Some(value) => parse(key, &value),
        None => Ok(default),
    }
}

/// Like [`parsed_or`], but the value has to fall within `range`
pub fn bounded_or<T>(
    lookup: &impl Lookup,
    key: &'static str,
    default: T,
    range: RangeInclusive<T>,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Display,
    T::Err: Display,
{
    let value = parsed_or(lookup, key, default)?;
    if !range.contains(&value) {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: format!("expected a value from {} to {}", range.start(), range.end()),
        });
    }
    Ok(value)
}

/// Parse `key` if set
pub fn parsed_opt<T>(lookup: &impl Lookup, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    lookup.get(key).map(|value| parse(key, &value)).transpose()
}

/// Boolean flags accept `true`/`false`, `1`/`0` and `yes`/`no`
pub fn flag(lookup: &impl Lookup, key: &'static str) -> Result<bool, ConfigError> {
    match lookup.get(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) if matches!(v.as_str(), "true" | "1" | "yes") => Ok(true),
        Some(v) if matches!(v.as_str(), "false" | "0" | "no") => Ok(false),
        Some(v) => Err(ConfigError::Invalid {
            key,
            value: v,
            reason: "expected a boolean".to_string(),
        }),
    }
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Best-effort text of a caught panic payload
pub fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic")
}
