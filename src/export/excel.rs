//! Excelカタログ出力（CLI版）
//!
//! ワークブックの中身は gem_ai_common の excel_core で生成し、ここではファイルに書くだけ

use super::report::write_bytes_atomic;
use crate::error::{GemAiError, Result};
use gem_ai_common::export::excel_core::generate_catalog_buffer;
use gem_ai_common::AnalysisResult;
use std::path::Path;

pub fn generate_excel(results: &[AnalysisResult], output_path: &Path, title: &str) -> Result<()> {
    if results.is_empty() {
        return Err(GemAiError::ExcelGeneration("no gemstone data".into()));
    }

    let buffer = generate_catalog_buffer(results, title).map_err(GemAiError::ExcelGeneration)?;
    write_bytes_atomic(output_path, &buffer)?;

    tracing::info!(path = %output_path.display(), rows = results.len(), "Excelカタログ出力");
    Ok(())
}
