pub mod builder;
pub mod config;
pub mod docker;
pub mod error;
pub mod freshness;
pub mod image;
pub mod io;
pub mod paths;
pub mod plan;
pub mod process;
pub mod registry;
pub mod team;
pub mod types;
pub mod variant;

pub use error::{Result, ZzError};

/// Version string written into and compared against template stamps.
pub fn tool_version() -> String {
    format!("v{}", env!("CARGO_PKG_VERSION"))
}
