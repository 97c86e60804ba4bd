//! Permission domain model.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{WardenError, WardenResult};
use crate::tenant::TenantId;

static CODENAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z_]+:[a-z_]+$").expect("codename pattern compiles"));

/// Canonical permission identifier in `resource:action` form
/// (lowercase letters and underscores only, e.g. `tasks:read`).
///
/// A `Codename` can only be obtained through [`Codename::parse`], so any
/// value of this type is well-formed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Codename(String);

impl Codename {
    pub fn parse(value: impl Into<String>) -> WardenResult<Self> {
        let value = value.into();
        if CODENAME_PATTERN.is_match(&value) {
            Ok(Self(value))
        } else {
            Err(WardenError::validation(format!(
                "Invalid codename '{value}'. Must match 'resource:action' format \
                 (lowercase letters and underscores only)."
            )))
        }
    }

    pub fn is_valid(value: &str) -> bool {
        CODENAME_PATTERN.is_match(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before the colon.
    pub fn resource(&self) -> &str {
        self.0.split_once(':').map(|(r, _)| r).unwrap_or_default()
    }

    /// The part after the colon.
    pub fn action(&self) -> &str {
        self.0.split_once(':').map(|(_, a)| a).unwrap_or_default()
    }
}

impl fmt::Display for Codename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Codename {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Codename {
    type Error = WardenError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<&str> for Codename {
    type Error = WardenError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl FromStr for Codename {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Codename> for String {
    fn from(value: Codename) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Permission {
    pub id: Uuid,
    pub codename: Codename,
    pub description: String,
    /// `None` = global, visible to every tenant.
    pub tenant_id: Option<TenantId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePermission {
    pub codename: Codename,
    pub description: String,
    pub tenant_id: Option<TenantId>,
}
