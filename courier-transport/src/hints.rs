//! Header conventions that steer how a message is queued.
//!
//! - [`EXPIRE_HEADER`] carries a non-negative millisecond count used as the
//!   envelope time-to-live. It stays in the message.
//! - [`PRIORITY_HEADER`] carries `low`, `high` or an integer. It is stripped
//!   from the message before it is serialized.
//!
//! Bad values never fail a send: the caller logs the [`HintError`] and falls
//! back to the default.

use std::{
    num::{IntErrorKind, ParseIntError},
    time::Duration,
};

use courier_queue::Priority;
use thiserror::Error;

pub const PRIORITY_HEADER: &str = "X-Send-priority";
pub const EXPIRE_HEADER: &str = "X-Send-expire";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HintError {
    #[error("Invalid value for {header} - {value}: {source}")]
    NotAnInteger {
        header: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("Invalid value for {header} - {value}: must not be negative")]
    Negative { header: &'static str, value: String },
}

///
/// Map a priority header value onto a queue priority.
///
/// `low` is 1, `high` is 8, integers are clamped into `0..=9`. Integers too
/// large for an `i64` saturate to the nearest bound.
///
/// # Errors
///
/// If the value is neither keyword nor an integer.
///
pub fn parse_priority(value: &str) -> Result<Priority, HintError> {
    let value = value.trim();
    match value {
        "low" => Ok(Priority::LOW),
        "high" => Ok(Priority::HIGH),
        _ => match value.parse::<i64>() {
            Ok(priority) => Ok(Priority::clamped(priority)),
            Err(source) => match source.kind() {
                IntErrorKind::PosOverflow => Ok(Priority::HIGHEST),
                IntErrorKind::NegOverflow => Ok(Priority::LOWEST),
                _ => Err(HintError::NotAnInteger {
                    header: PRIORITY_HEADER,
                    value: value.to_string(),
                    source,
                }),
            },
        },
    }
}

///
/// Parse an expiry header value into a time-to-live.
///
/// Zero means the envelope never expires and maps to `None`.
///
/// # Errors
///
/// If the value is not an integer, or is negative.
///
pub fn parse_expiry(value: &str) -> Result<Option<Duration>, HintError> {
    let value = value.trim();
    let millis = value
        .parse::<i64>()
        .map_err(|source| HintError::NotAnInteger {
            header: EXPIRE_HEADER,
            value: value.to_string(),
            source,
        })?;

    match u64::try_from(millis) {
        Ok(0) => Ok(None),
        Ok(millis) => Ok(Some(Duration::from_millis(millis))),
        Err(_) => Err(HintError::Negative {
            header: EXPIRE_HEADER,
            value: value.to_string(),
        }),
    }
}
