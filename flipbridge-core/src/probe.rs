use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Accessible,
    Inaccessible(String),
    /// The probe could not tell. Loading proceeds and the surface reports
    /// any failure itself.
    Indeterminate(String),
}

/// Pre-flight check run before a surface is mounted.
#[async_trait]
pub trait ResourceProbe: Send + Sync {
    async fn probe(&self, location: &str) -> ProbeOutcome;
}

/// Checks local paths and `file://` URLs on disk; remote documents are left
/// to the surface.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalProbe;

impl LocalProbe {
    fn local_path(location: &str) -> Result<Option<PathBuf>, String> {
        if location.starts_with("http://") || location.starts_with("https://") {
            return Ok(None);
        }
        if location.starts_with("file://") {
            let url = Url::parse(location).map_err(|err| err.to_string())?;
            return url
                .to_file_path()
                .map(Some)
                .map_err(|()| format!("{location} is not a local file URL"));
        }
        Ok(Some(PathBuf::from(location)))
    }
}

#[async_trait]
impl ResourceProbe for LocalProbe {
    async fn probe(&self, location: &str) -> ProbeOutcome {
        let path = match Self::local_path(location) {
            Ok(Some(path)) => path,
            Ok(None) => {
                return ProbeOutcome::Indeterminate("remote document".to_string());
            }
            Err(reason) => return ProbeOutcome::Inaccessible(reason),
        };
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => ProbeOutcome::Accessible,
            Ok(_) => ProbeOutcome::Inaccessible("not a regular file".to_string()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                ProbeOutcome::Inaccessible("not found".to_string())
            }
            Err(err) if err.kind() == ErrorKind::PermissionDenied => {
                ProbeOutcome::Inaccessible("permission denied".to_string())
            }
            Err(err) => {
                debug!(?err, ?path, "could not verify document");
                ProbeOutcome::Indeterminate(err.to_string())
            }
        }
    }
}
