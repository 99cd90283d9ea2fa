//! Identifiers for predictions and reviewed versions.

use std::fmt;
use std::str::FromStr;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use ulid::{Generator, Ulid};

use crate::storage::InvalidNameError;

/// Validates an opaque identifier.
///
/// IDs end up as file names and path components, so they are restricted to
/// 1-128 ASCII alphanumerics, `_` and `-`.
fn validate_id(id: &str) -> Result<(), InvalidNameError> {
    if id.is_empty() {
        return Err(InvalidNameError::Empty);
    }

    if id.len() > 128 {
        return Err(InvalidNameError::TooLong(id.len()));
    }

    for (i, c) in id.chars().enumerate() {
        if !c.is_ascii_alphanumeric() && c != '_' && c != '-' {
            return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
        }
    }

    Ok(())
}

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// create a new ID, validating the input
            pub fn new(id: impl Into<String>) -> Result<Self, InvalidNameError> {
                let id = id.into();
                validate_id(&id)?;
                Ok(Self(id))
            }

            /// get the string representation
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = InvalidNameError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = InvalidNameError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

opaque_id!(
    /// Identity of a machine-generated prediction run.
    PredictionId
);

opaque_id!(
    /// Identity of one reviewed version of a prediction.
    VersionId
);

impl PredictionId {
    /// Generate a new ULID-based prediction ID.
    pub fn generate() -> Self {
        Self(Ulid::new().to_string().to_lowercase())
    }
}

impl VersionId {
    fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid.to_string().to_lowercase())
    }
}

/// Mints version IDs that sort in creation order.
///
/// Plain ULIDs minted in the same millisecond order randomly; the monotonic
/// generator increments the random part instead, so IDs from one generator
/// are strictly increasing and can break ties between equal timestamps.
pub struct VersionIdGenerator {
    inner: Mutex<Generator>,
}

impl VersionIdGenerator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Generator::new()),
        }
    }

    /// Mint the next ID.
    pub fn next_id(&self) -> VersionId {
        let mut generator = self.inner.lock();
        match generator.generate() {
            Ok(ulid) => VersionId::from_ulid(ulid),
            // random part overflowed within one millisecond: fall back to a
            // fresh ULID rather than failing the write
            Err(_) => VersionId::from_ulid(Ulid::new()),
        }
    }
}

impl Default for VersionIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for VersionIdGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionIdGenerator").finish_non_exhaustive()
    }
}
