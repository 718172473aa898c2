use std::str::FromStr;

use tracing::{Metadata, metadata::LevelFilter};
use tracing_subscriber::{
    Layer, filter::FilterFn, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt,
};

/// Emit an event inside a named span. Use [`internal!`] or [`relay!`].
#[doc(hidden)]
#[macro_export]
macro_rules! __span_event {
    ($level:expr, $span:expr, $($msg:expr),*) => {{
        let span = $crate::tracing::span!($level, $span);
        let _enter = span.enter();

        $crate::tracing::event!($level, $($msg),*)
    }};
}

/// Lifecycle of the relay itself: startup, shutdown, registration with the
/// monitoring registry. Defaults to `DEBUG`.
#[macro_export]
macro_rules! internal {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::__span_event!($crate::tracing::Level::$level, "internal", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::internal!(level = DEBUG, $($msg),*)
    };
}

/// Envelopes crossing the queue boundary, in either direction: the forwarder
/// enqueuing a message and the delivery worker taking one off. Defaults to
/// `TRACE`, as it fires once per message.
#[macro_export]
macro_rules! relay {
    (level = $level:ident, $($msg:expr),*) => {
        $crate::__span_event!($crate::tracing::Level::$level, "relay", $($msg),*)
    };

    ($($msg:expr),*) => {
        $crate::relay!(level = TRACE, $($msg),*)
    };
}

const fn default_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::TRACE
    } else {
        LevelFilter::INFO
    }
}

/// Resolve a `LOG_LEVEL` value, falling back to the build's default.
fn level_from(value: Option<&str>) -> LevelFilter {
    let default = default_level();

    value.map_or(default, |level| {
        LevelFilter::from_str(level).unwrap_or_else(|_| {
            eprintln!("Invalid log level specified {level}, defaulting to {default}");
            default
        })
    })
}

/// Only the relay's own crates are logged; dependencies stay quiet.
fn is_courier_target(metadata: &Metadata<'_>) -> bool {
    metadata.target().starts_with("courier")
}

/// Install the global subscriber.
///
/// Calling this more than once is harmless; later calls leave the first
/// subscriber in place.
pub fn init() {
    let level = level_from(std::env::var("LOG_LEVEL").ok().as_deref());

    let _ = tracing_subscriber::Registry::default()
        .with(
            tracing_subscriber::fmt::layer()
                .with_file(false)
                .with_line_number(false)
                .compact()
                .with_ansi(true)
                .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
                .with_filter(level)
                .with_filter(FilterFn::new(is_courier_target)),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use tracing::{Level, callsite::Identifier, field::FieldSet, metadata::Kind};

    use super::*;

    struct Nowhere;

    impl tracing::Callsite for Nowhere {
        fn set_interest(&self, _: tracing::subscriber::Interest) {}

        fn metadata(&self) -> &Metadata<'_> {
            unreachable!()
        }
    }

    static NOWHERE: Nowhere = Nowhere;

    fn metadata(target: &'static str) -> Metadata<'static> {
        Metadata::new(
            "event",
            target,
            Level::INFO,
            None,
            None,
            None,
            FieldSet::new(&[], Identifier(&NOWHERE)),
            Kind::EVENT,
        )
    }

    #[test]
    fn level_names_are_accepted() {
        assert_eq!(level_from(Some("warn")), LevelFilter::WARN);
        assert_eq!(level_from(Some("TRACE")), LevelFilter::TRACE);
        assert_eq!(level_from(Some("off")), LevelFilter::OFF);
    }

    #[test]
    fn missing_or_bad_level_uses_default() {
        assert_eq!(level_from(None), default_level());
        assert_eq!(level_from(Some("chatty")), default_level());
    }

    #[test]
    fn only_courier_targets_pass() {
        assert!(is_courier_target(&metadata("courier_transport::forwarder")));
        assert!(is_courier_target(&metadata("courier")));
        assert!(!is_courier_target(&metadata("mailparse")));
        assert!(!is_courier_target(&metadata("tokio::runtime")));
    }
}
