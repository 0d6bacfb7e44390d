use crate::error::{DamError, Result};
use crate::identifier::{CombinedIdentifier, Scheme, ROOT_ID};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const CONFIG_FILENAME: &str = "storage.json";
const DEFAULT_MASTER_IMAGE_SIZE: u32 = 1600;

/// Storage configuration for one DAM-backed storage, stored in `storage.json`.
///
/// Incomplete configurations load fine; [`DriverConfig::validate`] reports what is
/// missing and the driver refuses remote operations until it is fixed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DriverConfig {
    /// Host storage id, must be positive.
    #[serde(default)]
    pub storage_id: u32,

    #[serde(default)]
    pub canto_name: String,

    #[serde(default)]
    pub canto_domain: String,

    #[serde(default)]
    pub app_id: String,

    #[serde(default)]
    pub app_secret: String,

    /// Scheme of the configured root container (`folder` or `album`).
    #[serde(default)]
    pub root_folder_scheme: Option<Scheme>,

    /// Remote id of the configured root container.
    #[serde(default)]
    pub root_folder: Option<String>,

    /// Longest edge of the master image the MDC transformations are computed against.
    #[serde(default = "default_master_image_size")]
    pub master_image_size: u32,
}

fn default_master_image_size() -> u32 {
    DEFAULT_MASTER_IMAGE_SIZE
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            storage_id: 0,
            canto_name: String::new(),
            canto_domain: String::new(),
            app_id: String::new(),
            app_secret: String::new(),
            root_folder_scheme: None,
            root_folder: None,
            master_image_size: DEFAULT_MASTER_IMAGE_SIZE,
        }
    }
}

impl DriverConfig {
    /// Load config from the given directory, or return defaults if not found
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILENAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(DamError::Io)?;
        let config: DriverConfig =
            serde_json::from_str(&content).map_err(DamError::Serialization)?;
        Ok(config)
    }

    /// Save config to the given directory
    pub fn save<P: AsRef<Path>>(&self, config_dir: P) -> Result<()> {
        let config_dir = config_dir.as_ref();

        if !config_dir.exists() {
            fs::create_dir_all(config_dir).map_err(DamError::Io)?;
        }

        let config_path = config_dir.join(CONFIG_FILENAME);
        let content = serde_json::to_string_pretty(self).map_err(DamError::Serialization)?;
        fs::write(config_path, content).map_err(DamError::Io)?;
        Ok(())
    }

    /// Names of required settings that are missing or empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.storage_id == 0 {
            missing.push("storageId");
        }
        for (name, value) in [
            ("cantoName", &self.canto_name),
            ("cantoDomain", &self.canto_domain),
            ("appId", &self.app_id),
            ("appSecret", &self.app_secret),
        ] {
            if value.trim().is_empty() {
                missing.push(name);
            }
        }
        missing
    }

    pub fn validate(&self) -> Result<()> {
        let missing = self.missing_fields();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(DamError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )))
        }
    }

    pub fn is_valid(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// The configured root container, or `folder#ROOT` when the configured
    /// scheme is not a container or the id is empty.
    pub fn root_identifier(&self) -> CombinedIdentifier {
        let scheme = self.root_folder_scheme.unwrap_or(Scheme::Folder);
        let id = self.root_folder.as_deref().unwrap_or(ROOT_ID);
        if scheme.is_container() && !id.is_empty() {
            CombinedIdentifier::new(scheme, id)
        } else {
            CombinedIdentifier::root()
        }
    }

    /// Base URL of the DAM tenant.
    pub fn base_url(&self) -> String {
        format!("https://{}.{}", self.canto_name, self.canto_domain)
    }
}
