use bridge_directory::DirectoryConfig;
use bridge_types::path;
use serde::{Deserialize, Serialize};

use crate::error::{RepositoryError, RepositoryResult};

/// What `copy_entity` does when the target path already holds an entity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopyPolicy {
    /// Fail with `InvalidPath`.
    #[default]
    Reject,
    /// Delete the existing target subtree, then copy.
    Overwrite,
}

/// Storage configuration of a repository.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Store path below which entity containers live.
    pub storage_root: String,
    pub copy_policy: CopyPolicy,
    /// Object name of the serialized entity inside its container. Resources
    /// may not use this name.
    pub entity_object_name: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            storage_root: "/content".to_string(),
            copy_policy: CopyPolicy::Reject,
            entity_object_name: "Entity.object".to_string(),
        }
    }
}

impl RepositoryConfig {
    pub fn validate(&self) -> RepositoryResult<()> {
        if !self.storage_root.starts_with(path::SEPARATOR) {
            return Err(RepositoryError::Config(format!(
                "storage root must be absolute: {}",
                self.storage_root
            )));
        }
        path::validate_segment(&self.entity_object_name).map_err(|e| {
            RepositoryError::Config(format!("entity object name: {e}"))
        })?;
        Ok(())
    }
}

/// Top-level configuration of the bridge, usually loaded from TOML.
///
/// ```toml
/// [repository]
/// storage_root = "/content"
/// copy_policy = "overwrite"
///
/// [directory]
/// root = "/index"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Absent when no repository storage has been configured.
    pub repository: Option<RepositoryConfig>,
    #[serde(default)]
    pub directory: DirectoryConfig,
}

impl BridgeConfig {
    pub fn from_toml_str(source: &str) -> RepositoryResult<Self> {
        toml::from_str(source).map_err(|e| RepositoryError::Config(e.to_string()))
    }

    /// The repository section, which must be present to build a repository.
    pub fn repository(&self) -> RepositoryResult<&RepositoryConfig> {
        self.repository.as_ref().ok_or_else(|| {
            RepositoryError::Config("repository storage configuration missing".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = RepositoryConfig::default();
        assert_eq!(c.storage_root, "/content");
        assert_eq!(c.copy_policy, CopyPolicy::Reject);
        assert_eq!(c.entity_object_name, "Entity.object");
        assert!(c.validate().is_ok());
    }

    #[test]
    fn full_toml() {
        let config = BridgeConfig::from_toml_str(
            r#"
            [repository]
            storage_root = "/data/repo"
            copy_policy = "overwrite"

            [directory]
            root = "/data/index"
            "#,
        )
        .unwrap();
        let repo = config.repository().unwrap();
        assert_eq!(repo.storage_root, "/data/repo");
        assert_eq!(repo.copy_policy, CopyPolicy::Overwrite);
        assert_eq!(repo.entity_object_name, "Entity.object");
        assert_eq!(config.directory.root, "/data/index");
    }

    #[test]
    fn empty_repository_table_uses_defaults() {
        let config = BridgeConfig::from_toml_str("[repository]\n").unwrap();
        assert_eq!(config.repository().unwrap(), &RepositoryConfig::default());
        assert_eq!(config.directory, DirectoryConfig::default());
    }

    #[test]
    fn missing_repository_section() {
        let config = BridgeConfig::from_toml_str("[directory]\nroot = \"/idx\"\n").unwrap();
        let err = config.repository().unwrap_err();
        assert!(matches!(err, RepositoryError::Config(ref m) if m.contains("missing")));
    }

    #[test]
    fn malformed_toml_is_config_error() {
        assert!(matches!(
            BridgeConfig::from_toml_str("[repository\n"),
            Err(RepositoryError::Config(_))
        ));
        assert!(matches!(
            BridgeConfig::from_toml_str("[repository]\ncopy_policy = \"merge\"\n"),
            Err(RepositoryError::Config(_))
        ));
    }

    #[test]
    fn validate_rejects_bad_values() {
        let relative = RepositoryConfig {
            storage_root: "content".into(),
            ..Default::default()
        };
        assert!(relative.validate().is_err());

        let nested = RepositoryConfig {
            entity_object_name: "a/b".into(),
            ..Default::default()
        };
        assert!(nested.validate().is_err());
    }
}
