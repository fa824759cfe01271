//! In-memory storage implementations
//!
//! This module provides an in-process key-value backend suitable for
//! development and testing.

mod kv;

pub use kv::MemoryKvBackend;
