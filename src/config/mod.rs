//! # Configuration Module
//!
//! Normalization policy plus the connection settings of the prediction
//! transport and the offline cache worker.

pub mod settings;

pub use settings::{ClientConfig, NormalizationPolicy, WorkerConfig};
