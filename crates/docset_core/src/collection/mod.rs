//! Typed document collections ("dbsets").

mod config;
mod dbset;

pub use config::{
    DbSetConfig, SplitConfig, SplitMode, DEFAULT_LOCATOR_FIELD, DEFAULT_REFERENCE_FIELD,
};
pub use dbset::DbSet;

pub(crate) use config::DbSetDefinition;
