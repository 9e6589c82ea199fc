//! Telemetry metric name constants.
//!
//! Centralised metric names for relay operations. Consumers install their
//! own `metrics` recorder (e.g. prometheus, statsd); without a recorder
//! installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `sluice_`. Counters end in `_total`.
//!
//! # Common labels
//!
//! - `relay`: the relay's configured name (see [`RelayConfig::name`](crate::RelayConfig))
//! - `kind`: terminal kind: "complete" or "error"

/// Items handed to a subscriber's `on_next`.
///
/// Labels: `relay`.
pub const ITEMS_DELIVERED_TOTAL: &str = "sluice_items_delivered_total";

/// Items discarded: arrived with no live subscription, after the terminal
/// signal, or cleared from the buffer on cancellation. Terminal signals
/// that arrive for a dead subscription or after the first one count too.
///
/// Labels: `relay`.
pub const ITEMS_DROPPED_TOTAL: &str = "sluice_items_dropped_total";

/// Calls made to the source's `pause()`.
///
/// Labels: `relay`.
pub const SOURCE_PAUSES_TOTAL: &str = "sluice_source_pauses_total";

/// Calls made to the source's `resume()`.
///
/// Labels: `relay`.
pub const SOURCE_RESUMES_TOTAL: &str = "sluice_source_resumes_total";

/// Terminal signals delivered to subscribers, replays included.
///
/// Labels: `relay`, `kind` ("complete" | "error").
pub const TERMINATIONS_TOTAL: &str = "sluice_terminations_total";

/// Subscriptions cancelled by their consumer.
///
/// Labels: `relay`.
pub const CANCELLATIONS_TOTAL: &str = "sluice_cancellations_total";
