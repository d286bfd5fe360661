use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    time::UNIX_EPOCH,
};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::error::{WallmaskError, WallmaskResult};

/// Persistent on-disk cache of source wallpapers, keyed by basename and
/// revalidated by (size, mtime). Consulted before reading any source file so
/// repeated runs against slow or remote storage only pay for changed inputs.
#[derive(Debug)]
pub struct SourceCache {
    dir: PathBuf,
    manifest: Manifest,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    entries: BTreeMap<String, SourceStamp>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct SourceStamp {
    len: u64,
    mtime_unix_secs: u64,
}

const MANIFEST_NAME: &str = "manifest.json";

impl SourceCache {
    pub fn open(dir: impl Into<PathBuf>) -> WallmaskResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create source cache dir '{}'", dir.display()))?;

        let manifest_path = dir.join(MANIFEST_NAME);
        let manifest = match std::fs::read(&manifest_path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!(path = %manifest_path.display(), error = %e, "unreadable cache manifest; starting fresh");
                Manifest::default()
            }),
            Err(_) => Manifest::default(),
        };
        Ok(Self { dir, manifest })
    }

    /// Return a local copy of `source`, reusing the cached one when its
    /// recorded (size, mtime) still match the source file.
    pub fn get_local(&mut self, source: &Path) -> WallmaskResult<PathBuf> {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                WallmaskError::planning(format!("source path '{}' has no basename", source.display()))
            })?
            .to_string();
        let local = self.dir.join(&name);

        let stamp = stamp_of(source)?;
        if self.manifest.entries.get(&name) == Some(&stamp) && local.is_file() {
            tracing::debug!(source = %source.display(), "source cache hit");
            return Ok(local);
        }

        std::fs::copy(source, &local).with_context(|| {
            format!("cache source '{}' -> '{}'", source.display(), local.display())
        })?;
        self.manifest.entries.insert(name, stamp);
        self.persist()?;
        tracing::debug!(source = %source.display(), "source cache refresh");
        Ok(local)
    }

    fn persist(&self) -> WallmaskResult<()> {
        let path = self.dir.join(MANIFEST_NAME);
        let json = serde_json::to_vec_pretty(&self.manifest).context("serialize cache manifest")?;
        std::fs::write(&path, json)
            .with_context(|| format!("write cache manifest '{}'", path.display()))?;
        Ok(())
    }
}

fn stamp_of(path: &Path) -> WallmaskResult<SourceStamp> {
    let meta = std::fs::metadata(path)
        .with_context(|| format!("stat source '{}'", path.display()))?;
    let mtime_unix_secs = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);
    Ok(SourceStamp {
        len: meta.len(),
        mtime_unix_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "wallmask_{name}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ))
    }

    #[test]
    fn caches_and_revalidates_by_size_and_mtime() {
        let src_dir = temp_dir("srccache_src");
        let cache_dir = temp_dir("srccache_cache");
        std::fs::create_dir_all(&src_dir).unwrap();
        let src = src_dir.join("wal.jpg");
        std::fs::write(&src, b"original").unwrap();

        let mut cache = SourceCache::open(&cache_dir).unwrap();
        let local = cache.get_local(&src).unwrap();
        assert_eq!(std::fs::read(&local).unwrap(), b"original");

        // Unchanged source: the cached copy is authoritative even if stale
        // bytes were written to it out of band.
        std::fs::write(&local, b"scribbled").unwrap();
        let again = cache.get_local(&src).unwrap();
        assert_eq!(std::fs::read(&again).unwrap(), b"scribbled");

        // A size change invalidates the entry.
        std::fs::write(&src, b"changed-len").unwrap();
        let refreshed = cache.get_local(&src).unwrap();
        assert_eq!(std::fs::read(&refreshed).unwrap(), b"changed-len");

        std::fs::remove_dir_all(&src_dir).ok();
        std::fs::remove_dir_all(&cache_dir).ok();
    }

    #[test]
    fn manifest_survives_reopen() {
        let src_dir = temp_dir("srccache_src2");
        let cache_dir = temp_dir("srccache_cache2");
        std::fs::create_dir_all(&src_dir).unwrap();
        let src = src_dir.join("wal.jpg");
        std::fs::write(&src, b"bytes").unwrap();

        {
            let mut cache = SourceCache::open(&cache_dir).unwrap();
            cache.get_local(&src).unwrap();
        }

        let mut cache = SourceCache::open(&cache_dir).unwrap();
        let local = cache.get_local(&src).unwrap();
        // Still a hit: the manifest was reloaded from disk.
        assert!(local.is_file());
        assert!(cache.manifest.entries.contains_key("wal.jpg"));

        std::fs::remove_dir_all(&src_dir).ok();
        std::fs::remove_dir_all(&cache_dir).ok();
    }

    #[test]
    fn corrupt_manifest_starts_fresh() {
        let cache_dir = temp_dir("srccache_corrupt");
        std::fs::create_dir_all(&cache_dir).unwrap();
        std::fs::write(cache_dir.join(MANIFEST_NAME), b"{not json").unwrap();
        let cache = SourceCache::open(&cache_dir).unwrap();
        assert!(cache.manifest.entries.is_empty());
        std::fs::remove_dir_all(&cache_dir).ok();
    }
}
