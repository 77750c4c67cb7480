//! Shared data model, state and configuration for sigwatch.
//!
//! - `analysis`: typed view over the upstream indicator results
//! - `state`: previous-cycle snapshot with the exchange-level merge
//! - `payload`: collapsed JSON mirror for structured channels
//! - `config`: YAML configuration with `${VAR}` resolution

pub mod analysis;
pub mod config;
pub mod error;
pub mod payload;
pub mod state;
pub mod value;

pub use analysis::*;
pub use config::{AlertSettings, AppConfig, NotifierConfig, PrimaryMarking};
pub use error::*;
pub use state::LastAnalysis;
