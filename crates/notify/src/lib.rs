//! Output sinks for triage alerts.
//!
//! A sink consumes the final `{cluster -> alerts}` grouping and renders or
//! ships it. The diagnosis core has no dependency on any of this.

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod sinks;

pub use error::SinkError;
pub use sinks::json::JsonSink;
pub use sinks::text::TextSink;
pub use sinks::webhook::WebhookSink;
pub use sinks::yaml::YamlSink;
pub use sinks::Sink;
