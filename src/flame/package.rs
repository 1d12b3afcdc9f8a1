//! Code packages.
//!
//! A job uploads a bincode-encoded `CodePackage` before issuing operator
//! requests. The worker keeps the latest one on disk as
//! `__worker<port>-current.pkg` so a restart picks it back up.

use crate::error::{FlameError, FlameResult};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Manifest of a job: its name and the closures it may invoke.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodePackage {
    pub job: String,
    pub closures: Vec<String>,
}

impl CodePackage {
    pub fn new(job: impl Into<String>, closures: Vec<String>) -> Self {
        Self {
            job: job.into(),
            closures,
        }
    }

    pub fn to_bytes(&self) -> FlameResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| FlameError::Package(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> FlameResult<Self> {
        bincode::deserialize(bytes)
            .map_err(|e| FlameError::BadRequest(format!("malformed code package: {}", e)))
    }
}

pub struct PackageStore {
    path: PathBuf,
    current: RwLock<Option<Arc<CodePackage>>>,
}

impl PackageStore {
    pub fn for_port(dir: &Path, port: u16) -> Self {
        Self {
            path: dir.join(format!("__worker{}-current.pkg", port)),
            current: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decodes, saves and activates an uploaded package.
    pub async fn install(&self, bytes: &[u8]) -> FlameResult<Arc<CodePackage>> {
        let package = Arc::new(CodePackage::from_bytes(bytes)?);

        tokio::fs::write(&self.path, bytes)
            .await
            .map_err(|e| FlameError::Package(format!("{}: {}", self.path.display(), e)))?;

        *self.current.write() = Some(package.clone());
        tracing::info!(
            "Installed package '{}' with {} closures",
            package.job,
            package.closures.len()
        );
        Ok(package)
    }

    /// The active package, read back from disk on first use.
    pub async fn current(&self) -> FlameResult<Arc<CodePackage>> {
        let cached = self.current.read().clone();
        if let Some(package) = cached {
            return Ok(package);
        }

        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FlameError::BadRequest(
                    "no code package has been uploaded".to_string(),
                ));
            }
            Err(e) => {
                return Err(FlameError::Package(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let package = Arc::new(CodePackage::from_bytes(&bytes)?);
        *self.current.write() = Some(package.clone());
        Ok(package)
    }
}
