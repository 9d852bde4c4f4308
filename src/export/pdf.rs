//! PDFブローシャー生成
//!
//! ページ内容（テキスト・余白・画像の並び）は gem_ai_common の pdf_core が決め、
//! ここでは printpdf で上から順に配置するだけ。入りきらない要素は次ページへ送る。

use super::report::write_bytes_atomic;
use crate::cli::PdfQuality;
use crate::error::{GemAiError, Result};
use gem_ai_common::export::pdf_core::{
    build_gemstone_page, build_title_page, Align, BrochureBlock, FontStyle, RgbColor, GREY,
};
use gem_ai_common::layout::{line_height_mm, pt_to_mm, BrochureLayout, BODY_FONT_PT};
use gem_ai_common::AnalysisResult;
use image::{DynamicImage, RgbImage};
use printpdf::{
    BuiltinFont, Color, Image as PdfImage, ImageTransform, IndirectFontRef, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Rgb as PdfRgb,
};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::Path;

/// 埋め込み解像度
const IMAGE_DPI: f32 = 300.0;

/// 中央揃え時の平均文字幅（em）
const AVG_CHAR_WIDTH_EM: f32 = 0.5;

/// 生成結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrochureStats {
    pub pages: usize,
    pub specimens: usize,
    pub missing_images: usize,
}

/// 埋め込み用に縮小・RGB化した画像
struct PreparedImage {
    image: DynamicImage,
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    oblique: IndirectFontRef,
}

impl Fonts {
    fn load(doc: &PdfDocumentReference) -> Result<Self> {
        let add = |font: BuiltinFont| {
            doc.add_builtin_font(font)
                .map_err(|e| GemAiError::PdfGeneration(format!("フォント追加エラー: {:?}", e)))
        };
        Ok(Self {
            regular: add(BuiltinFont::Helvetica)?,
            bold: add(BuiltinFont::HelveticaBold)?,
            oblique: add(BuiltinFont::HelveticaOblique)?,
        })
    }

    fn get(&self, style: FontStyle) -> &IndirectFontRef {
        match style {
            FontStyle::Regular => &self.regular,
            FontStyle::Bold => &self.bold,
            FontStyle::Oblique => &self.oblique,
        }
    }
}

/// 上から下へ要素を置いていくカーソル
struct PageCursor<'a> {
    doc: &'a PdfDocumentReference,
    layout: &'a BrochureLayout,
    fonts: &'a Fonts,
    layer: PdfLayerReference,
    y_mm: f32,
    pages: usize,
}

impl<'a> PageCursor<'a> {
    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(
            Mm(self.layout.page_width_mm),
            Mm(self.layout.page_height_mm),
            "Layer 1",
        );
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y_mm = self.layout.content_top_mm();
        self.pages += 1;
    }

    /// 残りが足りなければ改ページ
    fn ensure_space(&mut self, height_mm: f32) {
        let at_top = (self.y_mm - self.layout.content_top_mm()).abs() < f32::EPSILON;
        if !at_top && self.y_mm - height_mm < self.layout.content_bottom_mm() {
            self.new_page();
        }
    }

    fn draw_text(&mut self, text: &str, font: FontStyle, size_pt: f32, color: RgbColor, align: Align) {
        let height = line_height_mm(size_pt);
        self.ensure_space(height);

        let text = to_latin1(text);
        let x = match align {
            Align::Left => self.layout.margin_x_mm,
            Align::Center => {
                let width = text.chars().count() as f32 * pt_to_mm(size_pt * AVG_CHAR_WIDTH_EM);
                self.layout.centered_x_mm(width).max(self.layout.margin_x_mm)
            }
        };
        let baseline = self.y_mm - pt_to_mm(size_pt);

        let (r, g, b) = color;
        self.layer.set_fill_color(Color::Rgb(PdfRgb::new(r, g, b, None)));
        self.layer
            .use_text(text, size_pt, Mm(x), Mm(baseline), self.fonts.get(font));
        self.y_mm -= height;
    }

    fn draw_image(&mut self, prepared: &PreparedImage) {
        let (w_px, h_px) = (prepared.image.width(), prepared.image.height());
        let (width_mm, height_mm) = self.layout.fit_image(w_px, h_px);
        if width_mm <= 0.0 || height_mm <= 0.0 {
            return;
        }
        self.ensure_space(height_mm);

        // DPI指定時の原寸（mm）に対する倍率
        let native_width_mm = w_px as f32 / IMAGE_DPI * 25.4;
        let native_height_mm = h_px as f32 / IMAGE_DPI * 25.4;

        let x = self.layout.centered_x_mm(width_mm);
        let y = self.y_mm - height_mm;
        PdfImage::from_dynamic_image(&prepared.image).add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(x)),
                translate_y: Some(Mm(y)),
                scale_x: Some(width_mm / native_width_mm),
                scale_y: Some(height_mm / native_height_mm),
                dpi: Some(IMAGE_DPI),
                ..Default::default()
            },
        );
        self.y_mm = y;
    }

    fn draw_blocks(
        &mut self,
        blocks: &[BrochureBlock],
        images: &HashMap<String, PreparedImage>,
        missing: &mut usize,
    ) {
        for block in blocks {
            match block {
                BrochureBlock::Text {
                    text,
                    font,
                    size_pt,
                    color,
                    align,
                } => self.draw_text(text, *font, *size_pt, *color, *align),
                BrochureBlock::Spacer(mm) => {
                    self.y_mm -= mm;
                }
                BrochureBlock::Image { file_name } => match images.get(file_name) {
                    Some(prepared) => self.draw_image(prepared),
                    None => {
                        *missing += 1;
                        self.draw_text(
                            &format!("Image not found: {}", file_name),
                            FontStyle::Oblique,
                            BODY_FONT_PT,
                            GREY,
                            Align::Center,
                        );
                    }
                },
            }
        }
    }
}

/// ブローシャーPDFを生成
///
/// # Arguments
/// * `images_dir` - 画像フォルダ（None なら画像なしで "Image not found" を表示）
pub fn generate_brochure(
    results: &[AnalysisResult],
    output_path: &Path,
    images_dir: Option<&Path>,
    title: &str,
    quality: PdfQuality,
) -> Result<BrochureStats> {
    if results.is_empty() {
        return Err(GemAiError::PdfGeneration("no gemstone data".into()));
    }

    let layout = BrochureLayout::default();
    let images = prepare_images(results, images_dir, quality);

    let (doc, page1, layer1) = PdfDocument::new(
        title,
        Mm(layout.page_width_mm),
        Mm(layout.page_height_mm),
        "Layer 1",
    );
    let fonts = Fonts::load(&doc)?;

    let mut cursor = PageCursor {
        doc: &doc,
        layout: &layout,
        fonts: &fonts,
        layer: doc.get_page(page1).get_layer(layer1),
        y_mm: layout.content_top_mm(),
        pages: 1,
    };
    let mut missing_images = 0;

    cursor.draw_blocks(&build_title_page(&layout, title, results.len()), &images, &mut missing_images);

    for (index, result) in results.iter().enumerate() {
        cursor.new_page();
        let blocks = build_gemstone_page(&layout, result, index, results.len());
        cursor.draw_blocks(&blocks, &images, &mut missing_images);
    }

    let pages = cursor.pages;
    let bytes = doc
        .save_to_bytes()
        .map_err(|e| GemAiError::PdfGeneration(format!("PDF保存エラー: {:?}", e)))?;
    write_bytes_atomic(output_path, &bytes)?;

    tracing::info!(
        path = %output_path.display(),
        pages,
        missing_images,
        "PDFブローシャー出力"
    );

    Ok(BrochureStats {
        pages,
        specimens: results.len(),
        missing_images,
    })
}

/// 画像を並列に読み込み・縮小する（読めない画像は欠落扱い）
fn prepare_images(
    results: &[AnalysisResult],
    images_dir: Option<&Path>,
    quality: PdfQuality,
) -> HashMap<String, PreparedImage> {
    let Some(dir) = images_dir else {
        return HashMap::new();
    };

    results
        .par_iter()
        .filter_map(|result| {
            let path = dir.join(&result.image_filename);
            match load_image(&path, quality) {
                Ok(image) => Some((result.image_filename.clone(), PreparedImage { image })),
                Err(e) => {
                    tracing::warn!(file = %result.image_filename, error = %e, "画像を埋め込めません");
                    None
                }
            }
        })
        .collect()
}

fn load_image(path: &Path, quality: PdfQuality) -> Result<DynamicImage> {
    let image = image::open(path)
        .map_err(|e| GemAiError::ImageLoad(format!("{}: {}", path.display(), e)))?;

    let max = quality.max_pixels();
    let image = if image.width() > max || image.height() > max {
        image.thumbnail(max, max)
    } else {
        image
    };

    Ok(flatten_to_rgb(&image))
}

/// 透過を白背景に合成してRGB8にする
fn flatten_to_rgb(image: &DynamicImage) -> DynamicImage {
    let rgba = image.to_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = pixel[3] as f32 / 255.0;
        let blend = |c: u8| (c as f32 * alpha + 255.0 * (1.0 - alpha)).round() as u8;
        rgb.put_pixel(x, y, image::Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }

    DynamicImage::ImageRgb8(rgb)
}

/// 組み込みフォントで表示できない文字を '?' に置き換える
fn to_latin1(text: &str) -> String {
    text.chars()
        .map(|c| if (c as u32) < 0x100 { c } else { '?' })
        .collect()
}
