//! Temporary on-disk copies of fetched photos.
//!
//! Every asset is a [`NamedTempFile`] owned by a [`TempAssets`] collection.  The
//! collection is scoped to one render: dropping it removes every file, which
//! covers successful renders, sink failures, cancelled requests and panics.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use tempfile::NamedTempFile;

use crate::error::{ReportError, Result};

const ASSET_PREFIX: &str = "photo_";
const ASSET_SUFFIX: &str = ".img";

/// One fetched photo materialised on disk.
#[derive(Debug)]
pub struct TempAsset {
    file: NamedTempFile,
    position: usize,
    source: String,
}

impl TempAsset {
    /// Location of the temporary file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Index of the originating photo reference within its record.
    pub fn position(&self) -> usize {
        self.position
    }
}

/// Temporary assets created by a single render.
#[derive(Debug)]
pub struct TempAssets {
    dir: PathBuf,
    assets: Vec<TempAsset>,
}

impl TempAssets {
    /// Prepares an empty collection rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| ReportError::TempAsset {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            assets: Vec::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TempAsset> {
        self.assets.iter()
    }

    /// Writes `bytes` to a new temporary file and returns it.
    pub fn store(
        &mut self,
        position: usize,
        source: &str,
        bytes: &[u8],
    ) -> std::io::Result<&TempAsset> {
        let mut file = tempfile::Builder::new()
            .prefix(ASSET_PREFIX)
            .suffix(ASSET_SUFFIX)
            .tempfile_in(&self.dir)?;
        file.write_all(bytes)?;
        file.flush()?;
        debug!(
            "stored {} bytes from {} at {}",
            bytes.len(),
            source,
            file.path().display()
        );

        self.assets.push(TempAsset {
            file,
            position,
            source: source.to_owned(),
        });
        Ok(&self.assets[self.assets.len() - 1])
    }

    /// Removes the file backing the most recently stored asset.
    pub fn discard_last(&mut self) {
        if let Some(asset) = self.assets.pop() {
            remove_asset(asset);
        }
    }
}

fn remove_asset(asset: TempAsset) {
    let path = asset.file.path().to_path_buf();
    let asset_source = asset.source;
    if let Err(err) = asset.file.close() {
        warn!(
            "failed to remove temporary asset {} (from {}): {}",
            path.display(),
            asset_source,
            err
        );
    }
}

impl Drop for TempAssets {
    fn drop(&mut self) {
        let count = self.assets.len();
        for asset in self.assets.drain(..) {
            remove_asset(asset);
        }
        if count > 0 {
            debug!(
                "removed {} temporary assets from {}",
                count,
                self.dir.display()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TempAssets;

    fn file_count(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).expect("read temp dir").count()
    }

    #[test]
    fn dropping_the_collection_removes_every_file() {
        let root = tempfile::tempdir().expect("tempdir");
        let mut assets = TempAssets::new(root.path().join("assets")).expect("asset dir");

        let first = assets
            .store(0, "https://img.example/a.jpg", b"first")
            .expect("store first")
            .path()
            .to_path_buf();
        assets
            .store(2, "https://img.example/b.jpg", b"second")
            .expect("store second");

        assert!(first.is_file());
        assert_eq!(assets.len(), 2);
        assert_eq!(file_count(assets.dir()), 2);

        let dir = assets.dir().to_path_buf();
        drop(assets);
        assert_eq!(file_count(&dir), 0);
    }

    #[test]
    fn discard_last_removes_only_the_newest_asset() {
        let root = tempfile::tempdir().expect("tempdir");
        let mut assets = TempAssets::new(root.path()).expect("asset dir");
        assets.store(0, "a", b"a").expect("store a");
        assets.store(1, "b", b"b").expect("store b");

        assets.discard_last();

        assert_eq!(assets.len(), 1);
        assert_eq!(assets.iter().next().map(|a| a.position()), Some(0));
        assert_eq!(file_count(root.path()), 1);
    }

    #[test]
    fn cleanup_runs_during_unwinding() {
        let root = tempfile::tempdir().expect("tempdir");
        let dir = root.path().to_path_buf();

        let result = std::panic::catch_unwind(|| {
            let mut assets = TempAssets::new(&dir).expect("asset dir");
            assets.store(0, "a", b"bytes").expect("store");
            panic!("render aborted");
        });

        assert!(result.is_err());
        assert_eq!(file_count(root.path()), 0);
    }
}
