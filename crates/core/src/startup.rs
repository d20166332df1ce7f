//! Startup tracing configuration.

use tracehub_protocol::CategoryFilter;

use crate::error::{Error, Result};

/// Environment variable consulted by [`StartupTraceConfig::from_env`].
pub const STARTUP_CATEGORIES_ENV: &str = "TRACE_STARTUP_CATEGORIES";

/// Configuration for tracing that begins at process start, before any
/// subscriber has attached.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupTraceConfig {
    /// Comma-separated category spec; `-` prefixes mark exclusions, empty
    /// traces everything. Same grammar as [`CategoryFilter::parse`].
    pub categories: String,
}

impl StartupTraceConfig {
    pub fn new(categories: impl Into<String>) -> Self {
        Self {
            categories: categories.into(),
        }
    }

    /// Reads the config from `TRACE_STARTUP_CATEGORIES`.
    ///
    /// Returns `None` when the variable is unset or blank, meaning startup
    /// tracing was not requested.
    pub fn from_env() -> Option<Self> {
        match std::env::var(STARTUP_CATEGORIES_ENV) {
            Ok(spec) if !spec.trim().is_empty() => Some(Self::new(spec)),
            _ => None,
        }
    }

    /// Parses and validates the category spec.
    pub fn filter(&self) -> Result<CategoryFilter> {
        let filter = CategoryFilter::parse(&self.categories);
        if !filter.is_valid() {
            return Err(Error::InvalidFilter);
        }
        Ok(filter)
    }
}
