//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the workbench:
//! - Math types and placement helpers
//! - Logging utilities

pub mod math;
pub mod logging;
