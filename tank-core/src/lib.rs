//! Core control loop for a stepper-driven tank (differential) drive on no-std
//! embedded platforms.
//!
//! For a host-side simulation of the loop, see `tank-app/mock-mcu`.
#![no_std]

pub mod utils;
