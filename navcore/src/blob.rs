//! Abstract name-to-bytes lookup over a game data tree (§4.1).

use crate::error::{NavCoreResult, NavError};
use std::path::{Path, PathBuf};

/// Opens a logical resource path (forward- or backslash-separated) and
/// returns its raw bytes. Implementations are expected to be thread-safe;
/// the build orchestrator calls `open` from every worker thread.
pub trait BlobProvider: Send + Sync {
    fn open(&self, logical_name: &str) -> NavCoreResult<Vec<u8>>;
}

/// Normalizes a logical resource name (`World\Maps\Azeroth\Azeroth_32_48.adt`
/// or `World/Maps/...`) into a relative filesystem path.
fn normalize(logical_name: &str) -> PathBuf {
    logical_name.replace('\\', "/").split('/').collect()
}

/// Resolves logical names against a root directory on disk. The common
/// implementation: an on-disk, pre-extracted mirror of the game data tree,
/// or a directory backed by a read-only archive mount.
pub struct FsBlobProvider {
    root: PathBuf,
}

impl FsBlobProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsBlobProvider { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl BlobProvider for FsBlobProvider {
    fn open(&self, logical_name: &str) -> NavCoreResult<Vec<u8>> {
        let path = self.root.join(normalize(logical_name));
        std::fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                NavError::NotFound(format!("'{}' ({})", logical_name, path.display()))
            }
            _ => NavError::Corrupt(format!(
                "failed to read '{}': {e}",
                path.display()
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_backslashes() {
        let p = normalize(r"World\Maps\Azeroth\Azeroth_32_48.adt");
        assert_eq!(p, PathBuf::from("World/Maps/Azeroth/Azeroth_32_48.adt"));
    }

    #[test]
    fn missing_file_is_not_found() {
        let provider = FsBlobProvider::new("/nonexistent/does/not/exist");
        let err = provider.open("anything.adt").unwrap_err();
        assert!(matches!(err, NavError::NotFound(_)));
    }
}
