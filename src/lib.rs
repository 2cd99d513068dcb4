// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-message document-store operations for stream pipelines.
//!
//! See [`core::processor::DocumentProcessor`] for the entry point.

pub mod core;
