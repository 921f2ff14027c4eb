//! Core contracts and helpers for edk2db.
//!
//! This crate defines the run identifier and environment types, the EDK2
//! workspace path resolver and the INF file parser shared by the table
//! generators and the CLI.

pub mod env;
pub mod error;
pub mod inf;
pub mod path;
pub mod walk;

pub use env::{Env, RunId};
pub use error::{Error, Result};
pub use inf::{ALL_PHASES, InfFile, parse_inf, parse_inf_str};
pub use path::{Edk2Path, normalize_path, to_posix};
pub use walk::find_files;

/// Directory at the workspace root that holds build output and is never scanned.
pub const BUILD_DIR: &str = "Build";
