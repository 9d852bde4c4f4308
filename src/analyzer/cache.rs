//! 解析結果キャッシュモジュール
//!
//! 画像のSHA-256ハッシュをキーにして解析結果をキャッシュし、
//! 同じ画像の再解析（API呼び出し）をスキップする。

use crate::error::{GemAiError, Result};
use gem_ai_common::AnalysisResult;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

pub const CACHE_FILE_NAME: &str = ".gem-analysis-cache.json";

/// キャッシュファイルの構造
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheFile {
    /// バージョン（互換性チェック用）
    version: u32,
    /// ファイルハッシュ → 解析結果のマップ
    entries: BTreeMap<String, CacheEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub image_filename: String,
    pub file_size: u64,
    pub result: AnalysisResult,
}

impl CacheFile {
    const CURRENT_VERSION: u32 = 1;

    pub fn cache_path(folder: &Path) -> PathBuf {
        folder.join(CACHE_FILE_NAME)
    }

    /// キャッシュファイルを読み込み（壊れていれば空から始める）
    pub fn load(folder: &Path) -> Self {
        let cache_path = Self::cache_path(folder);
        if !cache_path.exists() {
            return Self::default();
        }

        let file = match File::open(&cache_path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(error = %e, "キャッシュを開けません、再生成します");
                return Self::default();
            }
        };

        match serde_json::from_reader::<_, CacheFile>(BufReader::new(file)) {
            Ok(cache) if cache.version == Self::CURRENT_VERSION => cache,
            Ok(_) => {
                tracing::warn!("キャッシュバージョン不一致、再生成します");
                Self::default()
            }
            Err(e) => {
                tracing::warn!(error = %e, "キャッシュが壊れています、再生成します");
                Self::default()
            }
        }
    }

    pub fn save(&self, folder: &Path) -> Result<()> {
        let cache_path = Self::cache_path(folder);
        let file = File::create(&cache_path).map_err(|source| GemAiError::Write {
            path: cache_path.clone(),
            source,
        })?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// キャッシュファイルを削除（存在した場合 true）
    pub fn clear(folder: &Path) -> Result<bool> {
        let cache_path = Self::cache_path(folder);
        if !cache_path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&cache_path)?;
        Ok(true)
    }

    /// ハッシュで検索（ファイル名は現在の名前に差し替える）
    ///
    /// サイズが記録と違うエントリは使わない。
    pub fn get(&self, hash: &str, file_size: u64, image_filename: &str) -> Option<AnalysisResult> {
        let entry = self.entries.get(hash).filter(|entry| entry.file_size == file_size)?;
        if entry.image_filename != image_filename {
            tracing::debug!(
                file = %image_filename,
                cached_as = %entry.image_filename,
                "別名で解析済みの画像"
            );
        }
        Some(AnalysisResult {
            image_filename: image_filename.to_string(),
            ..entry.result.clone()
        })
    }

    pub fn insert(&mut self, hash: String, file_size: u64, result: AnalysisResult) {
        self.entries.insert(
            hash,
            CacheEntry {
                image_filename: result.image_filename.clone(),
                file_size,
                result,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CacheFile {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

/// 画像バイト列のハッシュ（SHA-256, 16進）
pub fn compute_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gem_ai_common::GemstoneRecord;

    fn result(name: &str) -> AnalysisResult {
        AnalysisResult {
            image_filename: name.into(),
            english: GemstoneRecord {
                name: "Ruby".into(),
                areas_found: vec!["Myanmar".into()],
                confidence: 90,
                ..Default::default()
            },
            german: GemstoneRecord::default(),
        }
    }

    #[test]
    fn test_compute_hash_is_stable() {
        let a = compute_hash(b"abc");
        assert_eq!(a.len(), 64);
        assert_eq!(
            a,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(a, compute_hash(b"abd"));
    }

    #[test]
    fn test_get_uses_current_file_name() {
        let mut cache = CacheFile::default();
        cache.insert("h1".into(), 3, result("old.png"));

        let hit = cache.get("h1", 3, "renamed.png").unwrap();
        assert_eq!(hit.image_filename, "renamed.png");
        assert_eq!(hit.english.name, "Ruby");
        assert!(cache.get("h2", 3, "x.png").is_none());
    }

    #[test]
    fn test_get_rejects_size_mismatch() {
        let mut cache = CacheFile::default();
        cache.insert("h1".into(), 3, result("old.png"));

        assert!(cache.get("h1", 4, "old.png").is_none());
        assert!(cache.get("h1", 3, "old.png").is_some());
    }

    #[test]
    fn test_corrupt_cache_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(CacheFile::cache_path(dir.path()), "{not json").unwrap();
        assert!(CacheFile::load(dir.path()).is_empty());
    }
}
