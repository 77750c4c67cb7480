//! Notification channels for indicator alerts.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable notification channels
//! - Twilio, Discord, Slack, Gmail, Telegram, webhook and stdout notifiers
//! - Minijinja rendering of per-indicator alert fragments
//! - Factory that builds only the configured channels
//! - Dispatcher that delivers to all channels concurrently with timeouts

pub mod chunk;
pub mod discord;
pub mod dispatcher;
pub mod email;
pub mod factory;
pub mod slack;
pub mod stdout;
pub mod telegram;
pub mod templating;
pub mod traits;
pub mod twilio;
pub mod webhook;

pub use dispatcher::{Channel, Dispatcher};
pub use factory::{build_channels, build_channels_with};
pub use templating::{FragmentContext, TemplateRenderer};
pub use traits::{Delivery, DispatchResult, Notification, Notifier, NotifyError};
