//! Core engine: board scanning, tip tracking, settlement and analytics.
//!
//! Each module works against the storage traits, so the same code runs
//! over SQLite in the binary and over `MemoryStore` in tests.

pub mod analytics;
pub mod scanner;
pub mod settlement;
pub mod tracker;
