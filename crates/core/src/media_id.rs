//! Media identifier type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A client-supplied identifier naming one logical media file.
///
/// The same identifier is used for uploading and for watching. It is mapped
/// onto exactly one storage key by [`MediaId::storage_key`].
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MediaId(String);

impl MediaId {
    /// Parse and validate an identifier.
    ///
    /// Accepted ids are non-empty ASCII strings of at most
    /// [`MAX_MEDIA_ID_LEN`](crate::MAX_MEDIA_ID_LEN) bytes made of
    /// alphanumerics, `-`, `_` and `.`, and not starting with `.`.
    pub fn parse(id: &str) -> crate::Result<Self> {
        if id.is_empty() {
            return Err(crate::Error::InvalidMediaId("id is missing".to_string()));
        }

        if id.len() > crate::MAX_MEDIA_ID_LEN {
            return Err(crate::Error::InvalidMediaId(format!(
                "id must be at most {} bytes, got {}",
                crate::MAX_MEDIA_ID_LEN,
                id.len()
            )));
        }

        if id.starts_with('.') {
            return Err(crate::Error::InvalidMediaId(
                "id cannot start with '.'".to_string(),
            ));
        }

        if let Some(c) = id
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(crate::Error::InvalidMediaId(format!(
                "invalid character in id: {c:?}"
            )));
        }

        Ok(Self(id.to_string()))
    }

    /// Get the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Storage key of the durable media file for this id.
    pub fn storage_key(&self, extension: &str) -> String {
        format!("{}.{}", self.0, extension)
    }
}

impl TryFrom<String> for MediaId {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::parse(&value)
    }
}

impl From<MediaId> for String {
    fn from(id: MediaId) -> Self {
        id.0
    }
}

impl fmt::Debug for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MediaId({self})")
    }
}

impl fmt::Display for MediaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
