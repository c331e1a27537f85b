//! # Core Module
//!
//! Shared configuration types used by every subsystem.

pub mod config;

pub use config::{BenchConfig, Config, ConfigError, RenderDefaults, RendererConfig};
