//! Math utilities for the tank drive.
//!
//! This module provides the slew-rate limiter that shapes wheel speed changes.

pub mod slew;
