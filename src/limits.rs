//! Configurable bounds for path resolution.

use crate::{Error, Result};

/// Environment variable that overrides [`Limits::max_indirections`].
pub const MAX_INDIRECTIONS_ENV: &str = "TARWALK_MAX_INDIRECTIONS";

/// Configurable bounds for path resolution.
///
/// These protect against archives whose symlinks form cycles or long chains of redirections.
///
/// # Example
///
/// ```
/// use tarwalk::Limits;
///
/// // Use defaults
/// let limits = Limits::default();
/// assert_eq!(limits.max_indirections, 40);
///
/// // Customize limits
/// let shallow = Limits { max_indirections: 3 };
/// assert!(shallow.max_indirections < Limits::strict().max_indirections);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of symlinks expanded while resolving one path.
    ///
    /// The count is cumulative over the whole resolution, including links met while expanding
    /// other links.  Reaching the limit causes an [`Error::TooManyLinks`].
    ///
    /// Default: 40 (Linux `MAXSYMLINKS`).
    pub max_indirections: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_indirections: 40,
        }
    }
}

impl Limits {
    /// Create a new `Limits` with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create strict limits, matching `_POSIX_SYMLOOP_MAX`.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            max_indirections: 7,
        }
    }

    /// Create the default limits, with any override from the environment applied.
    ///
    /// See [`MAX_INDIRECTIONS_ENV`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut limits = Self::default();

        if let Some(value) = lookup(MAX_INDIRECTIONS_ENV) {
            limits.max_indirections = match value.trim().parse() {
                Ok(n) => n,
                Err(_) => {
                    return Err(Error::InvalidLimit {
                        name: MAX_INDIRECTIONS_ENV,
                        value,
                    })
                }
            };
        }

        Ok(limits)
    }
}
