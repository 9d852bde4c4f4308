pub mod excel;
pub mod pdf;
pub mod report;

pub use pdf::BrochureStats;
pub use report::{load_combined, ReportWriter, WriteReport, COMBINED_FILE_NAME, SUMMARY_FILE_NAME};

use crate::cli::{ExportFormat, PdfQuality};
use crate::error::Result;
use gem_ai_common::CombinedResults;
use std::path::{Path, PathBuf};

pub const DEFAULT_BROCHURE_NAME: &str = "gemstone_brochure";

fn output_path_for_format(output: &Path, name: &str, extension: &str) -> PathBuf {
    if output.is_dir() || output.extension().is_none() {
        output.join(format!("{}.{}", name, extension))
    } else {
        output.to_path_buf()
    }
}

fn output_paths_for_both(output: &Path, name: &str) -> (PathBuf, PathBuf) {
    if output.is_dir() || output.extension().is_none() {
        let pdf_path = output.join(format!("{}.pdf", name));
        let excel_path = output.join(format!("{}.xlsx", name));
        (pdf_path, excel_path)
    } else {
        let parent = output.parent().unwrap_or_else(|| Path::new("."));
        let stem = output
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(name);
        let pdf_path = parent.join(format!("{}.pdf", stem));
        let excel_path = parent.join(format!("{}.xlsx", stem));
        (pdf_path, excel_path)
    }
}

/// 統合結果からブローシャー（PDF/Excel）を出力し、書き出したパスを返す
pub fn export_results(
    combined: &CombinedResults,
    format: &ExportFormat,
    output: &Path,
    images_dir: Option<&Path>,
    title: &str,
    pdf_quality: PdfQuality,
) -> Result<Vec<PathBuf>> {
    let results = &combined.results;
    let mut written = Vec::new();

    let mut write_pdf = |path: PathBuf| -> Result<()> {
        println!("- PDFを生成中... (品質: {})", pdf_quality);
        let stats = pdf::generate_brochure(results, &path, images_dir, title, pdf_quality)?;
        println!("✔ PDF出力: {} ({}ページ)", path.display(), stats.pages);
        if stats.missing_images > 0 {
            println!("  ⚠ 画像が見つからない標本: {}件", stats.missing_images);
        }
        written.push(path);
        Ok(())
    };

    match format {
        ExportFormat::Pdf => {
            write_pdf(output_path_for_format(output, DEFAULT_BROCHURE_NAME, "pdf"))?;
        }
        ExportFormat::Excel => {
            let path = output_path_for_format(output, DEFAULT_BROCHURE_NAME, "xlsx");
            println!("- Excelを生成中...");
            excel::generate_excel(results, &path, title)?;
            println!("✔ Excel出力: {}", path.display());
            written.push(path);
        }
        ExportFormat::Both => {
            let (pdf_path, excel_path) = output_paths_for_both(output, DEFAULT_BROCHURE_NAME);
            write_pdf(pdf_path)?;

            println!("- Excelを生成中...");
            excel::generate_excel(results, &excel_path, title)?;
            println!("✔ Excel出力: {}", excel_path.display());
            written.push(excel_path);
        }
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_for_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = output_path_for_format(dir.path(), DEFAULT_BROCHURE_NAME, "pdf");
        assert_eq!(path, dir.path().join("gemstone_brochure.pdf"));
    }

    #[test]
    fn test_output_paths_for_both_with_file() {
        let (pdf, xlsx) = output_paths_for_both(Path::new("out/collection.pdf"), DEFAULT_BROCHURE_NAME);
        assert_eq!(pdf, Path::new("out/collection.pdf"));
        assert_eq!(xlsx, Path::new("out/collection.xlsx"));
    }
}
