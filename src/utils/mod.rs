//! The `utils` module provides a collection of utility functions and common
//! definitions used across the `streamrelay` application.
//!
//! This module centralizes the process-level error type and the logging
//! bootstrap so the binary and the tests share one way of doing both.

pub mod error;
pub mod logging;
