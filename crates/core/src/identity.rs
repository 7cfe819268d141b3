//! Unit identity - the five-part id of one logical ingestion stream.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one logical stream of data across all pipeline stages.
///
/// Watermarks, duplicate-ingestion checks, schema contract resolution and
/// payload file paths are all keyed by this tuple. `discriminator` and
/// `key` are the empty string when absent - never `None` - so equality and
/// SQL matching stay trivial.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct UnitIdentity {
    pub domain: String,
    pub source: String,
    pub dataset: String,
    /// Run-scoped discriminator, e.g. the snapshot date of a
    /// calendar-cadence dataset. Empty for interval datasets.
    pub discriminator: String,
    /// Ticker-like partition value. Empty for global datasets.
    pub key: String,
}

impl UnitIdentity {
    pub fn new(
        domain: impl Into<String>,
        source: impl Into<String>,
        dataset: impl Into<String>,
        discriminator: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            source: source.into(),
            dataset: dataset.into(),
            discriminator: discriminator.into(),
            key: key.into(),
        }
    }

    /// Same identity with the discriminator blanked. Used by the contract
    /// resolution fallback chain.
    pub fn without_discriminator(&self) -> Self {
        Self {
            discriminator: String::new(),
            ..self.clone()
        }
    }

    /// Same identity with the key blanked. Used by the contract resolution
    /// fallback chain.
    pub fn without_key(&self) -> Self {
        Self {
            key: String::new(),
            ..self.clone()
        }
    }
}

impl fmt::Display for UnitIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.domain, self.source, self.dataset)?;
        if !self.discriminator.is_empty() {
            write!(f, "/{}", self.discriminator)?;
        }
        if !self.key.is_empty() {
            write!(f, "/{}", self.key)?;
        }
        Ok(())
    }
}
