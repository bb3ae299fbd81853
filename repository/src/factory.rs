use serde_json::Value;
use shared_types::{RepoDescriptor, RepoKind};
use tracing::{info, instrument};

use crate::backends::{FsRepo, GithubRepo, MongoRepo, RemoteRepo, RepoBackend};
use crate::config::QueueConfig;
use crate::error::{RepoError, Result};
use crate::repository::Repository;

/// Builds ready repositories from descriptors. Holds no state beyond the
/// queue timing handed to versioned backends.
#[derive(Debug, Clone, Copy, Default)]
pub struct Repos {
    queue: QueueConfig,
}

impl Repos {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_queue_config(queue: QueueConfig) -> Self {
        Self { queue }
    }

    /// Accepts both `{type, options: {..}}` and the flat `{type, ..}` form.
    ///
    /// The tag is checked before the fields so an unknown type is reported
    /// as such, whatever else the descriptor contains.
    pub fn parse_descriptor(value: Value) -> Result<RepoDescriptor> {
        let Value::Object(mut map) = value else {
            return Err(RepoError::InvalidDescriptor(
                "descriptor must be a JSON object".to_string(),
            ));
        };

        let tag = match map.get("type") {
            Some(Value::String(tag)) => tag.clone(),
            Some(other) => return Err(RepoError::UnknownType(other.to_string())),
            None => return Err(RepoError::UnknownType("<missing>".to_string())),
        };
        tag.parse::<RepoKind>().map_err(RepoError::UnknownType)?;

        if let Some(Value::Object(options)) = map.remove("options") {
            for (field, value) in options {
                map.entry(field).or_insert(value);
            }
        }

        serde_json::from_value(Value::Object(map))
            .map_err(|e| RepoError::InvalidDescriptor(format!("{tag}: {e}")))
    }

    /// Maps a descriptor onto its backend. Performs no I/O.
    pub fn construct(&self, descriptor: RepoDescriptor) -> Result<RepoBackend> {
        let backend = match descriptor {
            RepoDescriptor::Fs(options) => RepoBackend::from(FsRepo::new(options)),
            RepoDescriptor::Github(options) => {
                RepoBackend::from(GithubRepo::with_config(options, self.queue)?)
            }
            RepoDescriptor::Mongo(options) => RepoBackend::from(MongoRepo::new(options)),
            RepoDescriptor::Remote(options) => RepoBackend::from(RemoteRepo::new(options)?),
        };
        Ok(backend)
    }

    #[instrument(skip(self, descriptor), fields(kind = %descriptor.kind()))]
    pub async fn open(&self, descriptor: RepoDescriptor) -> Result<Repository> {
        let repository = Repository::new(self.construct(descriptor)?);
        repository.sync().await?;
        info!("Opened {} repository {}", repository.kind(), repository.get_id());
        Ok(repository)
    }

    pub async fn open_value(&self, value: Value) -> Result<Repository> {
        self.open(Self::parse_descriptor(value)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_types::{FsOptions, GithubOptions};
    use std::path::PathBuf;

    #[test]
    fn test_unknown_type_is_rejected() {
        let err = Repos::parse_descriptor(json!({"type": "unknown-type"})).unwrap_err();
        assert!(matches!(err, RepoError::UnknownType(ref t) if t == "unknown-type"));
        assert_eq!(err.to_string(), "Unknown repo type: unknown-type");
    }

    #[test]
    fn test_missing_type_is_rejected() {
        let err = Repos::parse_descriptor(json!({"base_dir": "/tmp"})).unwrap_err();
        assert!(matches!(err, RepoError::UnknownType(_)));
    }

    #[test]
    fn test_non_object_is_invalid() {
        let err = Repos::parse_descriptor(json!("fs")).unwrap_err();
        assert!(matches!(err, RepoError::InvalidDescriptor(_)));
    }

    #[test]
    fn test_options_wrapper_and_flat_forms_agree() {
        let wrapped = Repos::parse_descriptor(json!({
            "type": "fs",
            "options": {"base_dir": "/var/data", "name": "notes"}
        }))
        .unwrap();
        let flat = Repos::parse_descriptor(json!({
            "type": "fs",
            "base_dir": "/var/data",
            "name": "notes"
        }))
        .unwrap();

        assert_eq!(wrapped, flat);
        assert_eq!(
            flat,
            RepoDescriptor::Fs(FsOptions {
                base_dir: PathBuf::from("/var/data"),
                name: "notes".to_string(),
            })
        );
    }

    #[test]
    fn test_missing_fields_are_invalid() {
        let err = Repos::parse_descriptor(json!({"type": "github", "username": "octo"}))
            .unwrap_err();
        assert!(matches!(err, RepoError::InvalidDescriptor(ref m) if m.starts_with("github")));
    }

    #[test]
    fn test_construct_dispatches_on_kind() {
        let repos = Repos::new();
        let backend = repos
            .construct(RepoDescriptor::Github(GithubOptions {
                key: "token".to_string(),
                username: "octo".to_string(),
                repo: "notes".to_string(),
                branch: "main".to_string(),
                api_url: None,
            }))
            .unwrap();

        assert!(matches!(backend, RepoBackend::Github(_)));
    }

    #[tokio::test]
    async fn test_unknown_type_fails_before_io() {
        let err = Repos::new()
            .open_value(json!({"type": "unknown-type", "base_dir": "/nonexistent"}))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RepoError::UnknownType(_)));
    }
}
