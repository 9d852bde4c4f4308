//! PDF export core: パンフレットのページ構成（描画ライブラリ非依存）
//!
//! 各ページを BrochureBlock の列として組み立て、描画側（printpdf）は
//! ブロックを上から順に配置するだけにする。

use crate::layout::{
    wrap_text, BrochureLayout, AREAS_FONT_PT, BODY_FONT_PT, LANGUAGE_FONT_PT, NAME_FONT_PT,
    SPECIMEN_FONT_PT, SUBTITLE_FONT_PT, TITLE_FONT_PT,
};
use crate::types::{AnalysisResult, GemstoneRecord};

pub const TITLE_EN: &str = "Semi-Precious Gemstone Collection";
pub const TITLE_DE: &str = "Halbedelstein-Sammlung";

const INTRO_EN: &str = "This collection showcases semi-precious gemstones analyzed using \
advanced artificial intelligence. Each specimen has been carefully examined to provide detailed \
information about its characteristics, geographic origins, and mineralogical properties.";

const INTRO_DE: &str = "Diese Sammlung zeigt Halbedelsteine, die mit fortschrittlicher \
künstlicher Intelligenz analysiert wurden. Jedes Exemplar wurde sorgfältig untersucht, um \
detaillierte Informationen über seine Eigenschaften, geografischen Ursprünge und \
mineralogischen Eigenschaften zu liefern.";

/// RGB (0.0-1.0)
pub type RgbColor = (f32, f32, f32);

pub const BLACK: RgbColor = (0.0, 0.0, 0.0);
pub const DARK_BLUE: RgbColor = (0.0, 0.0, 0.545);
pub const DARK_GREEN: RgbColor = (0.0, 0.392, 0.0);
pub const DARK_RED: RgbColor = (0.545, 0.0, 0.0);
pub const GREY: RgbColor = (0.5, 0.5, 0.5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Regular,
    Bold,
    Oblique,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
}

/// ページを構成する1要素
#[derive(Debug, Clone, PartialEq)]
pub enum BrochureBlock {
    Text {
        text: String,
        font: FontStyle,
        size_pt: f32,
        color: RgbColor,
        align: Align,
    },
    /// 縦方向の空き（mm）
    Spacer(f32),
    /// 宝石写真（ファイル名で画像フォルダから解決）
    Image { file_name: String },
}

/// 言語ごとの見出し・ラベル
struct SectionLabels {
    heading: &'static str,
    unknown_name: &'static str,
    no_description: &'static str,
    locations: &'static str,
    confidence: &'static str,
}

const ENGLISH_LABELS: SectionLabels = SectionLabels {
    heading: "English",
    unknown_name: "Unknown",
    no_description: "No description available",
    locations: "Geographic locations:",
    confidence: "AI Confidence Level:",
};

const GERMAN_LABELS: SectionLabels = SectionLabels {
    heading: "Deutsch",
    unknown_name: "Unbekannt",
    no_description: "Keine Beschreibung verfügbar",
    locations: "Geografische Standorte:",
    confidence: "KI-Vertrauensniveau:",
};

fn text(text: impl Into<String>, font: FontStyle, size_pt: f32, color: RgbColor, align: Align) -> BrochureBlock {
    BrochureBlock::Text {
        text: text.into(),
        font,
        size_pt,
        color,
        align,
    }
}

/// 折り返しながらテキストブロックを追加
fn push_wrapped(
    blocks: &mut Vec<BrochureBlock>,
    layout: &BrochureLayout,
    body: &str,
    font: FontStyle,
    size_pt: f32,
    color: RgbColor,
    align: Align,
) {
    for line in wrap_text(body, layout.chars_per_line(size_pt)) {
        blocks.push(text(line, font, size_pt, color, align));
    }
}

/// 表紙
///
/// 既定タイトルのときだけドイツ語タイトルを併記する。
pub fn build_title_page(layout: &BrochureLayout, title: &str, specimen_count: usize) -> Vec<BrochureBlock> {
    let title = match title.trim() {
        "" => TITLE_EN,
        t => t,
    };
    let mut blocks = vec![BrochureBlock::Spacer(18.0)];
    push_wrapped(&mut blocks, layout, title, FontStyle::Bold, TITLE_FONT_PT, DARK_BLUE, Align::Center);
    if title == TITLE_EN {
        blocks.push(text(TITLE_DE, FontStyle::Bold, TITLE_FONT_PT, DARK_BLUE, Align::Center));
    }
    blocks.push(BrochureBlock::Spacer(14.0));

    push_wrapped(
        &mut blocks,
        layout,
        &format!("Analysis of {} gemstone specimens using AI technology", specimen_count),
        FontStyle::Regular,
        SUBTITLE_FONT_PT,
        DARK_BLUE,
        Align::Center,
    );
    push_wrapped(
        &mut blocks,
        layout,
        &format!("Analyse von {} Edelstein-Exemplaren mit KI-Technologie", specimen_count),
        FontStyle::Regular,
        SUBTITLE_FONT_PT,
        DARK_BLUE,
        Align::Center,
    );
    blocks.push(BrochureBlock::Spacer(10.0));

    push_wrapped(&mut blocks, layout, INTRO_EN, FontStyle::Regular, BODY_FONT_PT, BLACK, Align::Left);
    blocks.push(BrochureBlock::Spacer(4.0));
    push_wrapped(&mut blocks, layout, INTRO_DE, FontStyle::Regular, BODY_FONT_PT, BLACK, Align::Left);

    blocks
}

fn push_language_section(
    blocks: &mut Vec<BrochureBlock>,
    layout: &BrochureLayout,
    record: &GemstoneRecord,
    labels: &SectionLabels,
) {
    blocks.push(text(labels.heading, FontStyle::Bold, LANGUAGE_FONT_PT, BLACK, Align::Left));

    let name = if record.name.is_empty() { labels.unknown_name } else { record.name.as_str() };
    blocks.push(text(name, FontStyle::Bold, NAME_FONT_PT, DARK_GREEN, Align::Center));

    let description = if record.description.is_empty() {
        labels.no_description
    } else {
        record.description.as_str()
    };
    push_wrapped(blocks, layout, description, FontStyle::Regular, BODY_FONT_PT, BLACK, Align::Left);

    if !record.areas_found.is_empty() {
        let areas = format!("{} {}", labels.locations, record.areas_found.join(", "));
        push_wrapped(blocks, layout, &areas, FontStyle::Oblique, AREAS_FONT_PT, DARK_RED, Align::Left);
    }

    blocks.push(text(
        format!("{} {}%", labels.confidence, record.confidence),
        FontStyle::Oblique,
        AREAS_FONT_PT,
        DARK_RED,
        Align::Left,
    ));
}

/// 宝石1件分のページ
///
/// # Arguments
/// * `index` - 0始まりの通し番号
/// * `total` - 総件数
pub fn build_gemstone_page(
    layout: &BrochureLayout,
    result: &AnalysisResult,
    index: usize,
    total: usize,
) -> Vec<BrochureBlock> {
    let mut blocks = vec![
        text(
            format!(
                "Specimen {} of {} | Exemplar {} von {}",
                index + 1,
                total,
                index + 1,
                total
            ),
            FontStyle::Regular,
            SPECIMEN_FONT_PT,
            GREY,
            Align::Center,
        ),
        BrochureBlock::Spacer(3.5),
        BrochureBlock::Image {
            file_name: result.image_filename.clone(),
        },
        BrochureBlock::Spacer(5.0),
    ];

    push_language_section(&mut blocks, layout, &result.english, &ENGLISH_LABELS);
    blocks.push(BrochureBlock::Spacer(5.0));
    push_language_section(&mut blocks, layout, &result.german, &GERMAN_LABELS);

    blocks
}
