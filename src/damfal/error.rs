use thiserror::Error;

#[derive(Error, Debug)]
pub enum DamError {
    /// The remote DAM has no asset with this scheme and id.
    #[error("Asset not found: {scheme}#{id}")]
    NotFound { scheme: String, id: String },

    /// The remote DAM has no folder or album with this scheme and id.
    #[error("Folder does not exist: {0}")]
    FolderDoesNotExist(String),

    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Authorization failed: {0}")]
    AuthorizationFailed(String),

    #[error("Malformed identifier: {0:?}")]
    MalformedIdentifier(String),

    #[error("Requested field is not part of the projection: {0}")]
    MissingRequestedField(String),

    /// The driver refuses remote operations, either because the storage
    /// configuration is incomplete or because initialization failed.
    #[error("Driver is misconfigured: {0}")]
    Misconfigured(String),

    #[error("Unsupported hash algorithm: {0}")]
    UnsupportedHashAlgorithm(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl DamError {
    /// True for the "absent remotely" class, which callers expecting a boolean
    /// or a collection map to "does not exist" / empty.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            DamError::NotFound { .. } | DamError::FolderDoesNotExist(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_class() {
        assert!(DamError::FolderDoesNotExist("album#x".into()).is_not_found());
        assert!(DamError::NotFound {
            scheme: "image".into(),
            id: "a1".into()
        }
        .is_not_found());
        assert!(!DamError::RemoteUnavailable("timeout".into()).is_not_found());
        assert!(!DamError::Misconfigured("no app id".into()).is_not_found());
    }

    #[test]
    fn test_display_messages() {
        let err = DamError::NotFound {
            scheme: "image".into(),
            id: "a1".into(),
        };
        assert_eq!(err.to_string(), "Asset not found: image#a1");
        assert_eq!(
            DamError::MalformedIdentifier("nope".into()).to_string(),
            "Malformed identifier: \"nope\""
        );
    }
}
