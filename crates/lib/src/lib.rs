//! buildmatrix-lib: build matrix orchestration for native multi-platform builds
//!
//! This crate provides the pieces that turn a declarative target description
//! into a set of backend builds:
//! - `platform`: host/target identities and toolchain resolution
//! - `matrix`: combination expansion and validity rules
//! - `backend`: the staged configure/build/install/package driver
//! - `execute`: sequential and bounded-parallel execution with fail-fast
//! - `report`: result aggregation, rendering and exit status
//! - `config`: the `buildmatrix.toml` project configuration

pub mod backend;
pub mod config;
pub mod consts;
pub mod execute;
pub mod matrix;
pub mod platform;
pub mod report;
#[cfg(test)]
mod util;
