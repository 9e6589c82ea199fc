//! Sluice - backpressure-aware push-to-pull stream relay
//!
//! This crate bridges a push-based source with advisory flow control
//! ([`ReadStream`]: item/end/failure handlers plus `pause()`/`resume()`) to a
//! demand-driven consumer ([`Subscriber`] with [`Subscription::request`]).
//! The [`Relay`] in between guarantees that a subscriber never receives
//! more items than it asked for, while pausing the source once the backlog
//! reaches a configurable high-water mark.
//!
//! # Callback Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sluice::{Relay, RelayConfig, Subscriber, Subscription};
//! # fn source() -> Arc<dyn sluice::ReadStream<String, std::io::ErrorKind>> { unimplemented!() }
//!
//! struct OneAtATime {
//!     subscription: Option<Subscription<String, std::io::ErrorKind>>,
//! }
//!
//! impl Subscriber<String, std::io::ErrorKind> for OneAtATime {
//!     fn on_subscribe(&mut self, subscription: &Subscription<String, std::io::ErrorKind>) {
//!         let _ = subscription.request(1);
//!         self.subscription = Some(subscription.clone());
//!     }
//!
//!     fn on_next(&mut self, line: String) {
//!         println!("{line}");
//!         if let Some(s) = &self.subscription {
//!             let _ = s.request(1);
//!         }
//!     }
//!
//!     fn on_complete(&mut self) {}
//!     fn on_error(&mut self, kind: std::io::ErrorKind) { eprintln!("failed: {kind}"); }
//! }
//!
//! let relay = Relay::new(source(), RelayConfig::new().high_water_mark(64));
//! relay.subscribe(OneAtATime { subscription: None })?;
//! # Ok::<(), sluice::SluiceError>(())
//! ```
//!
//! # Stream Example
//!
//! ```rust,no_run
//! use futures_util::{StreamExt, stream};
//! use sluice::{RelayConfig, bounded_stream};
//!
//! #[tokio::main]
//! async fn main() -> sluice::Result<()> {
//!     let inner = stream::iter((0..10_000u32).map(Ok::<_, String>));
//!     let mut relayed = bounded_stream(inner, RelayConfig::default())?;
//!
//!     while let Some(item) = relayed.next().await {
//!         println!("{item:?}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod pump;
pub mod relay;
pub mod source;
pub mod stream;
pub mod subscriber;
pub mod telemetry;
pub mod version;

// Re-export main types at crate root
pub use config::RelayConfig;
pub use error::{Result, SluiceError};
pub use pump::{StreamSource, bounded_stream};
pub use relay::{Relay, RelayState, RelayStats, Subscription};
pub use source::{EndHandler, FailureHandler, ItemHandler, ReadStream};
pub use stream::RelayStream;
pub use subscriber::{Subscriber, Terminal};
pub use version::{PKG_VERSION, version_string};
