//! `mt-domain`: shared types for memotic.
//!
//! Holds what every other crate agrees on: the error type, the layered
//! configuration, structured trace events, and the canonical [`note::Note`]
//! model together with the field-level coercion rules that turn loosely
//! shaped webhook memo objects into it.

pub mod config;
pub mod error;
pub mod note;
pub mod trace;
