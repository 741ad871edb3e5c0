//! Integration tests for the Service Bus extension configuration.
//!
//! The tests live under `tests/`; this crate has no library code of its own.
