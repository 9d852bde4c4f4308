//! 画像ローダー
//!
//! 入力フォルダ直下の画像をファイル名順に遅延列挙する。
//! 同じフォルダで `iter()` を呼び直せば最初から列挙し直せる。

use crate::error::{GemAiError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 対応画像形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    /// 拡張子から判定（大文字小文字は区別しない）
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "webp" => Some(ImageFormat::Webp),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Webp => "image/webp",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub path: PathBuf,
    pub file_name: String,
    pub format: ImageFormat,
}

/// 列挙された1画像（読み込み失敗は画像単位のエラーとして保持）
#[derive(Debug)]
pub struct ScannedImage {
    pub info: ImageInfo,
    pub bytes: Result<Vec<u8>>,
}

/// 入力フォルダ（存在確認済み）
#[derive(Debug, Clone)]
pub struct ImageSource {
    folder: PathBuf,
}

impl ImageSource {
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// 画像を遅延列挙（バイト列は next() のたびに読み込む）
    pub fn iter(&self) -> ImageIter {
        ImageIter {
            entries: WalkDir::new(&self.folder)
                .min_depth(1)
                .max_depth(1) // 直下のみ（再帰しない）
                .sort_by_file_name()
                .into_iter(),
        }
    }

    /// 画像情報のみ列挙（バイト列は読まない）
    pub fn list(&self) -> Vec<ImageInfo> {
        self.iter().infos().collect()
    }
}

pub struct ImageIter {
    entries: walkdir::IntoIter,
}

impl ImageIter {
    /// 次の対応画像の情報（バイト列は読まない）
    fn next_info(&mut self) -> Option<ImageInfo> {
        for entry in self.entries.by_ref() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "フォルダ走査エラー、スキップ");
                    continue;
                }
            };

            let path = entry.path();
            if !entry.file_type().is_file() {
                tracing::debug!(path = %path.display(), "ファイルではないためスキップ");
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().to_string();
            match ImageFormat::from_path(path) {
                Some(format) => {
                    return Some(ImageInfo {
                        path: path.to_path_buf(),
                        file_name,
                        format,
                    })
                }
                None => {
                    tracing::info!(file = %file_name, "対応していない形式のためスキップ");
                }
            }
        }
        None
    }

    fn infos(mut self) -> impl Iterator<Item = ImageInfo> {
        std::iter::from_fn(move || self.next_info())
    }
}

impl Iterator for ImageIter {
    type Item = ScannedImage;

    fn next(&mut self) -> Option<Self::Item> {
        let info = self.next_info()?;
        let bytes = std::fs::read(&info.path)
            .map_err(|e| GemAiError::ImageLoad(format!("{}: {}", info.file_name, e)));
        Some(ScannedImage { info, bytes })
    }
}

/// 入力フォルダを開く
///
/// フォルダが存在しない場合は FolderNotFound（処理開始前の致命的エラー）
pub fn scan_folder(folder: &Path) -> Result<ImageSource> {
    if !folder.is_dir() {
        return Err(GemAiError::FolderNotFound(folder.display().to_string()));
    }

    Ok(ImageSource {
        folder: folder.to_path_buf(),
    })
}
