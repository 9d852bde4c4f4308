//! 実行サマリー
//!
//! 最終的な CombinedResults と失敗ログから1回だけ計算される読み取り専用の集計。

use crate::types::{CombinedResults, FailureEntry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    /// 終端状態（成功 or 失敗）に到達した画像数
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<FailureEntry>,
    /// 英語名ごとの件数（名前順）
    pub gemstone_types_identified: BTreeMap<String, usize>,
    /// 成功分の英語信頼度の平均
    pub average_confidence: f64,
    /// 入力を使い切る前に中断された
    #[serde(default)]
    pub interrupted: bool,
    /// 出力ファイルの書き込み失敗（解析の成否とは別に数える）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub write_failures: Vec<FailureEntry>,
}

impl SummaryReport {
    pub fn from_run(combined: &CombinedResults, failures: &[FailureEntry], interrupted: bool) -> Self {
        let mut gemstone_types_identified = BTreeMap::new();
        let mut total_confidence: u64 = 0;

        for result in &combined.results {
            let name = if result.english.name.is_empty() {
                "Unknown".to_string()
            } else {
                result.english.name.clone()
            };
            *gemstone_types_identified.entry(name).or_insert(0) += 1;
            total_confidence += result.english.confidence as u64;
        }

        let succeeded = combined.len();
        let average_confidence = if succeeded > 0 {
            total_confidence as f64 / succeeded as f64
        } else {
            0.0
        };

        Self {
            processed: succeeded + failures.len(),
            succeeded,
            failed: failures.len(),
            failures: failures.to_vec(),
            gemstone_types_identified,
            average_confidence,
            interrupted,
            write_failures: Vec::new(),
        }
    }

    /// 1件も失敗がない（書き込み失敗を含む）
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.write_failures.is_empty()
    }
}
