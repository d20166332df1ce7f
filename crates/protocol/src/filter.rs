//! Category filter attached to a tracing session.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Inclusion/exclusion sets over category labels.
///
/// If both sets are empty, every category is traced. If `included` is
/// non-empty, only those categories are traced. Otherwise everything except
/// `excluded` is traced. A filter naming both sets at once is ambiguous and
/// rejected at the controller boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFilter {
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub included: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub excluded: BTreeSet<String>,
}

impl CategoryFilter {
    /// Filter that traces every category.
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter tracing only the given categories.
    pub fn include<I>(categories: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            included: categories.into_iter().map(Into::into).collect(),
            excluded: BTreeSet::new(),
        }
    }

    /// Filter tracing everything except the given categories.
    pub fn exclude<I>(categories: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            included: BTreeSet::new(),
            excluded: categories.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses a comma-separated category spec.
    ///
    /// Entries prefixed with `-` are excluded, everything else is included,
    /// blank entries are skipped. `"net,ui"` traces two categories;
    /// `"-gpu"` traces everything but one; `""` traces everything.
    pub fn parse(spec: &str) -> Self {
        let mut filter = Self::default();
        for entry in spec.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            match entry.strip_prefix('-') {
                Some(excluded) if !excluded.trim().is_empty() => {
                    filter.excluded.insert(excluded.trim().to_string());
                }
                Some(_) => {}
                None => {
                    filter.included.insert(entry.to_string());
                }
            }
        }
        filter
    }

    /// False when both an inclusion and an exclusion set are named.
    pub fn is_valid(&self) -> bool {
        self.included.is_empty() || self.excluded.is_empty()
    }

    /// True when every category passes.
    pub fn is_all(&self) -> bool {
        self.included.is_empty() && self.excluded.is_empty()
    }

    /// Whether events under `category` pass this filter.
    pub fn matches(&self, category: &str) -> bool {
        if !self.included.is_empty() {
            self.included.contains(category)
        } else {
            !self.excluded.contains(category)
        }
    }
}

impl fmt::Display for CategoryFilter {
    /// Renders the spec form accepted by [`CategoryFilter::parse`].
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for category in &self.included {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{category}")?;
            first = false;
        }
        for category in &self.excluded {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "-{category}")?;
            first = false;
        }
        Ok(())
    }
}
