//! 解析結果のJSON出力
//!
//! - `{stem}_analysis.json`: 画像ごとの結果
//! - `combined_gemstone_analysis.json`: 全結果
//! - `analysis_summary.json`: 実行サマリー
//!
//! 各ファイルは一時ファイルに書いてから rename する。
//! 1ファイルの失敗は WriteError として記録し、他の書き込みは続ける。

use crate::error::{GemAiError, Result};
use gem_ai_common::{AnalysisResult, CombinedResults, FailureEntry, FailureKind, SummaryReport};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const COMBINED_FILE_NAME: &str = "combined_gemstone_analysis.json";
pub const SUMMARY_FILE_NAME: &str = "analysis_summary.json";
const INDIVIDUAL_SUFFIX: &str = "_analysis.json";

/// 書き込み結果
#[derive(Debug)]
pub struct WriteReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<FailureEntry>,
    /// 書き込み失敗を反映した最終サマリー
    pub summary: SummaryReport,
}

pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn combined_path(&self) -> PathBuf {
        self.output_dir.join(COMBINED_FILE_NAME)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join(SUMMARY_FILE_NAME)
    }

    pub fn individual_path(&self, result: &AnalysisResult) -> PathBuf {
        self.output_dir.join(individual_file_name(result))
    }

    /// 全ファイルを書き出す（上書き、マージなし）
    pub fn write_all(&self, combined: &CombinedResults, summary: &SummaryReport) -> WriteReport {
        let mut written = Vec::new();
        let mut failures = Vec::new();

        if let Err(e) = fs::create_dir_all(&self.output_dir) {
            tracing::error!(dir = %self.output_dir.display(), error = %e, "出力フォルダを作成できません");
        }

        let mut record = |label: &str, path: PathBuf, outcome: Result<()>| match outcome {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "書き込み完了");
                written.push(path);
            }
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "書き込み失敗");
                failures.push(FailureEntry::new(label, FailureKind::Write, e.to_string()));
            }
        };

        for (result, planned) in combined.results.iter().zip(self.plan_individual(combined)) {
            let path = self.individual_path(result);
            let outcome = planned.and_then(|()| write_json_atomic(&path, result));
            record(&result.image_filename, path, outcome);
        }

        let path = self.combined_path();
        let outcome = write_json_atomic(&path, combined);
        record(COMBINED_FILE_NAME, path, outcome);

        let mut summary = summary.clone();
        summary.write_failures = failures.clone();

        let path = self.summary_path();
        match write_json_atomic(&path, &summary) {
            Ok(()) => written.push(path),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "サマリーの書き込み失敗");
                failures.push(FailureEntry::new(SUMMARY_FILE_NAME, FailureKind::Write, e.to_string()));
            }
        }

        WriteReport {
            written,
            failures,
            summary,
        }
    }

    /// 大文字小文字を無視して出力名の衝突を検出
    ///
    /// 2件目以降の衝突は書き込まずに OutputCollision とする。
    fn plan_individual(&self, combined: &CombinedResults) -> Vec<Result<()>> {
        let mut claimed: HashMap<String, String> = HashMap::new();
        claimed.insert(COMBINED_FILE_NAME.to_lowercase(), COMBINED_FILE_NAME.to_string());
        claimed.insert(SUMMARY_FILE_NAME.to_lowercase(), SUMMARY_FILE_NAME.to_string());

        combined
            .results
            .iter()
            .map(|result| {
                let key = individual_file_name(result).to_lowercase();
                match claimed.get(&key) {
                    Some(first) => Err(GemAiError::OutputCollision {
                        path: self.individual_path(result),
                        first: first.clone(),
                        second: result.image_filename.clone(),
                    }),
                    None => {
                        claimed.insert(key, result.image_filename.clone());
                        Ok(())
                    }
                }
            })
            .collect()
    }
}

fn individual_file_name(result: &AnalysisResult) -> String {
    format!("{}{}", result.file_stem(), INDIVIDUAL_SUFFIX)
}

/// 整形JSON（末尾改行つき）を一時ファイル経由で書き込む
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut content = serde_json::to_string_pretty(value)?;
    content.push('\n');
    write_bytes_atomic(path, content.as_bytes())
}

/// 同じフォルダの一時ファイルに書いてから rename する
pub fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{}.tmp", file_name));

    let write_error = |source: std::io::Error| GemAiError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Err(e) = fs::write(&temp_path, bytes) {
        let _ = fs::remove_file(&temp_path);
        return Err(write_error(e));
    }
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(write_error(e));
    }
    Ok(())
}

/// 統合結果ファイルを読み込む
pub fn load_combined(path: &Path) -> Result<CombinedResults> {
    if !path.exists() {
        return Err(GemAiError::FileNotFound(path.display().to_string()));
    }
    let content = fs::read_to_string(path)?;
    let combined: CombinedResults = serde_json::from_str(&content)?;
    Ok(combined)
}
