use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical supplier name exactly as the data source stores it, e.g. `ТОО Ромашка (1064)`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SupplierIdentity(pub String);

impl SupplierIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the name embeds `(<code>)` for the given numeric code.
    pub fn embeds_code(&self, code: &str) -> bool {
        self.0.contains(&format!("({code})"))
    }

    pub fn contains_ignore_case(&self, fragment: &str) -> bool {
        self.0.to_lowercase().contains(&fragment.to_lowercase())
    }
}

impl fmt::Display for SupplierIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SupplierIdentity {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SupplierIdentity {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}
