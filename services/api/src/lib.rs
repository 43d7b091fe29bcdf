//! services/api/src/lib.rs
//!
//! Library entry point for the tarot journal API service.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
