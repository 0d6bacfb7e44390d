//! # Combined Identifiers
//!
//! The host addresses every file and folder through a single opaque string. The DAM, however,
//! has a flat id space per *scheme* (`folder`, `album`, `image`, ...), and some assets can be
//! transformed on the fly by the delivery service (MDC). A combined identifier carries all
//! three facts in one token:
//!
//! ```text
//! image#8f3a2c        plain asset
//! image#8f3a2c#mdc    asset delivered through the MDC transformation endpoint
//! album#QK21          album (container of assets)
//! folder#ROOT         the root folder sentinel
//! ```
//!
//! ## Grammar
//!
//! - The first `#` separates the scheme tag from the rest.
//! - A trailing `#mdc` marks the MDC flag.
//! - Everything in between is the remote id and is taken verbatim.
//!
//! Decoding never needs a remote lookup, and `encode(decode(x)) == x` for every valid token.
//! Remote ids may contain `#`, but an empty id or one ending in `#mdc` has no token that
//! decodes back to it, so [`encode`] and [`encode_mdc`] refuse those.
//!
//! ## Containers
//!
//! [`Scheme::Folder`] and [`Scheme::Album`] are containers. Folders hold sub-folders and
//! albums, albums hold assets. Nothing else nests.
//!
//! ## Root
//!
//! The remote id [`ROOT_ID`] is reserved for the root folder regardless of scheme, so callers
//! can short-circuit without touching the repository (see [`CombinedIdentifier::is_root`]).

use crate::error::{DamError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between scheme tag, remote id and MDC flag.
pub const DELIMITER: char = '#';

/// Reserved remote id of the root folder.
pub const ROOT_ID: &str = "ROOT";

const MDC_FLAG: &str = "mdc";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Folder,
    Album,
    Image,
    Video,
    Audio,
    Document,
    Presentation,
    Other,
}

impl Scheme {
    pub const ALL: [Scheme; 8] = [
        Scheme::Folder,
        Scheme::Album,
        Scheme::Image,
        Scheme::Video,
        Scheme::Audio,
        Scheme::Document,
        Scheme::Presentation,
        Scheme::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Folder => "folder",
            Scheme::Album => "album",
            Scheme::Image => "image",
            Scheme::Video => "video",
            Scheme::Audio => "audio",
            Scheme::Document => "document",
            Scheme::Presentation => "presentation",
            Scheme::Other => "other",
        }
    }

    pub fn is_container(&self) -> bool {
        is_container_scheme(*self)
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = DamError;

    fn from_str(s: &str) -> Result<Self> {
        Scheme::ALL
            .iter()
            .copied()
            .find(|scheme| scheme.as_str() == s)
            .ok_or_else(|| DamError::MalformedIdentifier(s.to_string()))
    }
}

/// A decoded combined identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CombinedIdentifier {
    pub scheme: Scheme,
    pub remote_id: String,
    pub mdc: bool,
}

impl CombinedIdentifier {
    pub fn new(scheme: Scheme, remote_id: impl Into<String>) -> Self {
        Self {
            scheme,
            remote_id: remote_id.into(),
            mdc: false,
        }
    }

    pub fn with_mdc(mut self, mdc: bool) -> Self {
        self.mdc = mdc;
        self
    }

    /// The canonical root token, `folder#ROOT`.
    pub fn root() -> Self {
        Self::new(Scheme::Folder, ROOT_ID)
    }

    /// Like [`CombinedIdentifier::new`], but fails for remote ids that would not
    /// survive a trip through the token form.
    pub fn try_new(scheme: Scheme, remote_id: impl Into<String>) -> Result<Self> {
        let remote_id = remote_id.into();
        let ambiguous = remote_id.ends_with(&format!("{}{}", DELIMITER, MDC_FLAG));
        if remote_id.is_empty() || ambiguous {
            return Err(DamError::MalformedIdentifier(format!(
                "{}{}{}",
                scheme, DELIMITER, remote_id
            )));
        }
        Ok(Self::new(scheme, remote_id))
    }

    pub fn is_root(&self) -> bool {
        self.remote_id == ROOT_ID
    }

    pub fn is_container(&self) -> bool {
        self.scheme.is_container()
    }
}

impl fmt::Display for CombinedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.scheme, DELIMITER, self.remote_id)?;
        if self.mdc {
            write!(f, "{}{}", DELIMITER, MDC_FLAG)?;
        }
        Ok(())
    }
}

impl FromStr for CombinedIdentifier {
    type Err = DamError;

    fn from_str(token: &str) -> Result<Self> {
        let malformed = || DamError::MalformedIdentifier(token.to_string());

        let (tag, rest) = token.split_once(DELIMITER).ok_or_else(malformed)?;
        let scheme: Scheme = tag.parse().map_err(|_| malformed())?;

        let suffix = format!("{}{}", DELIMITER, MDC_FLAG);
        let (remote_id, mdc) = match rest.strip_suffix(suffix.as_str()) {
            Some(id) => (id, true),
            None => (rest, false),
        };
        if remote_id.is_empty() {
            return Err(malformed());
        }

        Ok(CombinedIdentifier {
            scheme,
            remote_id: remote_id.to_string(),
            mdc,
        })
    }
}

impl Serialize for CombinedIdentifier {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CombinedIdentifier {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let token = String::deserialize(deserializer)?;
        token.parse().map_err(serde::de::Error::custom)
    }
}

pub fn encode(scheme: Scheme, remote_id: &str) -> Result<String> {
    Ok(CombinedIdentifier::try_new(scheme, remote_id)?.to_string())
}

pub fn encode_mdc(scheme: Scheme, remote_id: &str) -> Result<String> {
    Ok(CombinedIdentifier::try_new(scheme, remote_id)?
        .with_mdc(true)
        .to_string())
}

pub fn decode(token: &str) -> Result<CombinedIdentifier> {
    token.parse()
}

pub fn is_container_scheme(scheme: Scheme) -> bool {
    matches!(scheme, Scheme::Folder | Scheme::Album)
}

/// Malformed tokens are simply not MDC-enabled.
pub fn is_mdc_enabled(token: &str) -> bool {
    decode(token).map(|id| id.mdc).unwrap_or(false)
}

pub fn validate(token: &str) -> bool {
    decode(token).is_ok()
}
