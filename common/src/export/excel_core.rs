//! Excel生成（共通ライブラリ）
//!
//! 解析結果を1行1件の一覧表（カタログ）として出力する

use crate::types::AnalysisResult;
use rust_xlsxwriter::*;

/// 一覧表の列定義 (見出し, 列幅)
pub const CATALOG_COLUMNS: &[(&str, f64)] = &[
    ("No.", 6.0),
    ("Image", 22.0),
    ("Name (EN)", 20.0),
    ("Name (DE)", 20.0),
    ("Confidence", 11.0),
    ("Areas (EN)", 32.0),
    ("Areas (DE)", 32.0),
    ("Description (EN)", 60.0),
    ("Description (DE)", 60.0),
];

/// 1件分のセル値（No. 列と信頼度列を除く文字列セル）
fn row_strings(result: &AnalysisResult) -> [String; 7] {
    [
        result.image_filename.clone(),
        result.english.name.clone(),
        result.german.name.clone(),
        result.english.areas_found.join(", "),
        result.german.areas_found.join(", "),
        result.english.description.clone(),
        result.german.description.clone(),
    ]
}

/// Excelをバッファに生成
///
/// # Arguments
/// * `results` - 解析結果（列挙順のまま出力）
/// * `title` - 1行目に表示するタイトル
pub fn generate_catalog_buffer(results: &[AnalysisResult], title: &str) -> Result<Vec<u8>, String> {
    let mut workbook = Workbook::new();

    let title_format = Format::new()
        .set_bold()
        .set_font_size(14.0)
        .set_font_color(Color::RGB(0x00008B))
        .set_align(FormatAlign::Left);

    let header_format = Format::new()
        .set_bold()
        .set_font_size(10.0)
        .set_background_color(Color::RGB(0xF5F5F5))
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_border(FormatBorder::Hair)
        .set_border_color(Color::RGB(0xAAAAAA));

    let value_format = Format::new()
        .set_font_size(10.0)
        .set_align(FormatAlign::Top)
        .set_text_wrap()
        .set_border(FormatBorder::Hair)
        .set_border_color(Color::RGB(0xCCCCCC));

    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name("Catalog")
        .map_err(|e| format!("シート名設定エラー: {}", e))?;

    let last_col = (CATALOG_COLUMNS.len() - 1) as u16;
    worksheet
        .merge_range(0, 0, 0, last_col, title, &title_format)
        .map_err(|e| format!("タイトル書き込みエラー: {}", e))?;

    for (col, (label, width)) in CATALOG_COLUMNS.iter().enumerate() {
        let col = col as u16;
        worksheet
            .set_column_width(col, *width)
            .map_err(|e| format!("列幅設定エラー: {}", e))?;
        worksheet
            .write_string_with_format(1, col, *label, &header_format)
            .map_err(|e| format!("見出し書き込みエラー: {}", e))?;
    }

    worksheet
        .set_freeze_panes(2, 0)
        .map_err(|e| format!("ウィンドウ枠固定エラー: {}", e))?;

    for (idx, result) in results.iter().enumerate() {
        let row = (idx + 2) as u32;
        let [image, name_en, name_de, areas_en, areas_de, desc_en, desc_de] = row_strings(result);

        worksheet
            .write_number_with_format(row, 0, (idx + 1) as f64, &value_format)
            .map_err(|e| format!("値書き込みエラー: {}", e))?;
        worksheet
            .write_number_with_format(row, 4, f64::from(result.english.confidence), &value_format)
            .map_err(|e| format!("値書き込みエラー: {}", e))?;

        for (col, value) in [
            (1u16, image),
            (2, name_en),
            (3, name_de),
            (5, areas_en),
            (6, areas_de),
            (7, desc_en),
            (8, desc_de),
        ] {
            worksheet
                .write_string_with_format(row, col, &value, &value_format)
                .map_err(|e| format!("値書き込みエラー: {}", e))?;
        }
    }

    workbook
        .save_to_buffer()
        .map_err(|e| format!("Excel保存エラー: {}", e))
}
