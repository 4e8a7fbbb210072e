//! Soundforged - batch audio converter
//!
//! This library crate exposes the command layer for integration testing.

pub mod config;
pub mod inputs;
pub mod report;
pub mod session;
