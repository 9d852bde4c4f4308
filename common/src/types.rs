//! 解析結果の型定義
//!
//! CLIと各エクスポートで共有される型:
//! - GemstoneRecord: 1言語分の宝石情報
//! - AnalysisResult: 1画像分の解析結果（英語 + ドイツ語）
//! - CombinedResults: 1回の実行で得られた全解析結果（列挙順）
//! - FailureEntry: 失敗した画像の記録

use serde::{Deserialize, Serialize};

/// 信頼度の上限
pub const MAX_CONFIDENCE: u8 = 100;

/// 1言語分の宝石情報
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GemstoneRecord {
    pub name: String,
    pub description: String,
    /// 産地（順序付き）
    pub areas_found: Vec<String>,
    /// 同定の信頼度 (0-100)
    pub confidence: u8,
}

impl GemstoneRecord {
    /// 不変条件: 信頼度 <= 100 かつ 信頼度 > 0 なら産地が1件以上
    pub fn is_valid(&self) -> bool {
        self.confidence <= MAX_CONFIDENCE && (self.confidence == 0 || !self.areas_found.is_empty())
    }
}

/// AI解析結果（1画像 = 英語 + ドイツ語）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub image_filename: String,
    #[serde(default)]
    pub english: GemstoneRecord,
    #[serde(default)]
    pub german: GemstoneRecord,
}

impl AnalysisResult {
    pub fn is_valid(&self) -> bool {
        self.english.is_valid() && self.german.is_valid()
    }

    /// 個別出力ファイルのステム（拡張子を除いたファイル名）
    pub fn file_stem(&self) -> &str {
        match self.image_filename.rfind('.') {
            Some(idx) if idx > 0 => &self.image_filename[..idx],
            _ => &self.image_filename,
        }
    }
}

/// 失敗の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// ネットワーク・認証・HTTPエラー（リトライ上限に達したレート制限を含む）
    #[serde(rename = "TransportError")]
    Transport,
    /// 構造化ペイロードを含まないレスポンス
    #[serde(rename = "MalformedResponseError")]
    MalformedResponse,
    /// 画像ファイルの読み込み失敗
    #[serde(rename = "ReadError")]
    Read,
    /// 出力ファイルの書き込み失敗
    #[serde(rename = "WriteError")]
    Write,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Transport => write!(f, "TransportError"),
            FailureKind::MalformedResponse => write!(f, "MalformedResponseError"),
            FailureKind::Read => write!(f, "ReadError"),
            FailureKind::Write => write!(f, "WriteError"),
        }
    }
}

/// 失敗ログの1件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureEntry {
    pub image_filename: String,
    pub kind: FailureKind,
    pub message: String,
}

impl FailureEntry {
    pub fn new(image_filename: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            image_filename: image_filename.into(),
            kind,
            message: message.into(),
        }
    }
}

/// 1回の実行の全解析結果（Loaderの列挙順を保持）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedResults {
    pub total_images: usize,
    /// 実行開始日 (YYYY-MM-DD)
    pub analysis_date: String,
    pub results: Vec<AnalysisResult>,
}

impl CombinedResults {
    pub fn new(analysis_date: impl Into<String>) -> Self {
        Self {
            total_images: 0,
            analysis_date: analysis_date.into(),
            results: Vec::new(),
        }
    }

    /// 結果を末尾に追加
    ///
    /// 同じ image_filename が既にある場合は追加せず false を返す
    pub fn push(&mut self, result: AnalysisResult) -> bool {
        if self.contains(&result.image_filename) {
            return false;
        }
        self.results.push(result);
        self.total_images = self.results.len();
        true
    }

    pub fn contains(&self, image_filename: &str) -> bool {
        self.results.iter().any(|r| r.image_filename == image_filename)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn filenames(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.image_filename.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(confidence: u8, areas: &[&str]) -> GemstoneRecord {
        GemstoneRecord {
            name: "Amethyst".to_string(),
            description: String::new(),
            areas_found: areas.iter().map(|s| s.to_string()).collect(),
            confidence,
        }
    }

    #[test]
    fn test_record_validity() {
        assert!(record(0, &[]).is_valid());
        assert!(record(90, &["Brazil"]).is_valid());
        assert!(!record(90, &[]).is_valid());
        assert!(!record(101, &["Brazil"]).is_valid());
    }

    #[test]
    fn test_file_stem() {
        let result = AnalysisResult {
            image_filename: "ruby1.png".to_string(),
            ..Default::default()
        };
        assert_eq!(result.file_stem(), "ruby1");

        let dotted = AnalysisResult {
            image_filename: "IMG_5982.bg.png".to_string(),
            ..Default::default()
        };
        assert_eq!(dotted.file_stem(), "IMG_5982.bg");

        let hidden = AnalysisResult {
            image_filename: ".png".to_string(),
            ..Default::default()
        };
        assert_eq!(hidden.file_stem(), ".png");
    }

    #[test]
    fn test_combined_rejects_duplicate_filename() {
        let mut combined = CombinedResults::new("2025-07-11");
        let a = AnalysisResult {
            image_filename: "a.png".to_string(),
            ..Default::default()
        };
        assert!(combined.push(a.clone()));
        assert!(!combined.push(a));
        assert_eq!(combined.len(), 1);
        assert_eq!(combined.total_images, 1);
    }

    #[test]
    fn test_failure_kind_serialization() {
        let entry = FailureEntry::new("b.png", FailureKind::MalformedResponse, "no payload");
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"MalformedResponseError\""));
        assert_eq!(FailureKind::Transport.to_string(), "TransportError");
    }

    #[test]
    fn test_combined_json_shape() {
        let mut combined = CombinedResults::new("2025-07-11");
        combined.push(AnalysisResult {
            image_filename: "a.png".to_string(),
            ..Default::default()
        });
        let value = serde_json::to_value(&combined).unwrap();
        assert_eq!(value["total_images"], 1);
        assert_eq!(value["analysis_date"], "2025-07-11");
        assert_eq!(value["results"][0]["image_filename"], "a.png");
        assert!(value["results"][0]["english"]["areas_found"].is_array());
    }
}
