//! CLI integration tests that run builds against a stub backend.

mod build_tests;
mod common;
