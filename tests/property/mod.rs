//! Property-based tests for digest determinism

mod determinism;
