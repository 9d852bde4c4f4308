//! レイアウト設定モジュール
//!
//! パンフレットPDFのmm基準レイアウト定義とテキスト折り返し

// ============================================
// mm基準レイアウト（Source of Truth）
// ============================================

/// A4サイズ（mm）
pub const A4_WIDTH_MM: f32 = 210.0;
pub const A4_HEIGHT_MM: f32 = 297.0;

/// 余白設定（mm）
pub const MARGIN_X_MM: f32 = 25.0;
pub const MARGIN_Y_MM: f32 = 15.0;

/// 利用可能幅（mm）
pub const USABLE_WIDTH_MM: f32 = A4_WIDTH_MM - MARGIN_X_MM * 2.0; // 160mm

/// 宝石写真の最大サイズ（4in × 3in）
pub const IMAGE_MAX_WIDTH_MM: f32 = 4.0 * 25.4; // 101.6mm
pub const IMAGE_MAX_HEIGHT_MM: f32 = 3.0 * 25.4; // 76.2mm

// ============================================
// フォントサイズ（pt）
// ============================================

pub const TITLE_FONT_PT: f32 = 24.0;
pub const SUBTITLE_FONT_PT: f32 = 14.0;
pub const NAME_FONT_PT: f32 = 18.0;
pub const LANGUAGE_FONT_PT: f32 = 14.0;
pub const BODY_FONT_PT: f32 = 12.0;
pub const AREAS_FONT_PT: f32 = 11.0;
pub const SPECIMEN_FONT_PT: f32 = 10.0;

/// 行送り = フォントサイズ × 係数
pub const LINE_HEIGHT_FACTOR: f32 = 1.25;

/// Helvetica の平均文字幅（em比）
const AVG_CHAR_WIDTH_EM: f32 = 0.5;

// ============================================
// 変換係数
// ============================================

/// mm → pt変換 (1mm = 72/25.4 pt ≈ 2.835pt)
pub const MM_TO_PT: f32 = 72.0 / 25.4;

/// mm → pt 変換
#[inline]
pub fn mm_to_pt(mm: f32) -> f32 {
    mm * MM_TO_PT
}

/// pt → mm 変換
#[inline]
pub fn pt_to_mm(pt: f32) -> f32 {
    pt / MM_TO_PT
}

/// フォントサイズに対する行送り（mm）
#[inline]
pub fn line_height_mm(font_pt: f32) -> f32 {
    pt_to_mm(font_pt * LINE_HEIGHT_FACTOR)
}

// ============================================
// レイアウト設定構造体
// ============================================

/// パンフレットレイアウト設定
#[derive(Debug, Clone)]
pub struct BrochureLayout {
    pub page_width_mm: f32,
    pub page_height_mm: f32,
    pub margin_x_mm: f32,
    pub margin_y_mm: f32,
    pub image_max_width_mm: f32,
    pub image_max_height_mm: f32,
}

impl Default for BrochureLayout {
    fn default() -> Self {
        Self {
            page_width_mm: A4_WIDTH_MM,
            page_height_mm: A4_HEIGHT_MM,
            margin_x_mm: MARGIN_X_MM,
            margin_y_mm: MARGIN_Y_MM,
            image_max_width_mm: IMAGE_MAX_WIDTH_MM,
            image_max_height_mm: IMAGE_MAX_HEIGHT_MM,
        }
    }
}

impl BrochureLayout {
    /// 利用可能幅（mm）
    pub fn usable_width_mm(&self) -> f32 {
        self.page_width_mm - self.margin_x_mm * 2.0
    }

    /// コンテンツ開始Y座標（mm、下から）
    pub fn content_top_mm(&self) -> f32 {
        self.page_height_mm - self.margin_y_mm
    }

    /// ページ下端のY座標（mm、下から）
    pub fn content_bottom_mm(&self) -> f32 {
        self.margin_y_mm
    }

    /// 指定フォントで1行に収まるおおよその文字数
    pub fn chars_per_line(&self, font_pt: f32) -> usize {
        let char_width_mm = pt_to_mm(font_pt * AVG_CHAR_WIDTH_EM);
        ((self.usable_width_mm() / char_width_mm).floor() as usize).max(1)
    }

    /// 画像を枠内に収めたときの表示サイズ（mm）。縦横比を維持する
    pub fn fit_image(&self, width_px: u32, height_px: u32) -> (f32, f32) {
        if width_px == 0 || height_px == 0 {
            return (0.0, 0.0);
        }
        let scale = (self.image_max_width_mm / width_px as f32)
            .min(self.image_max_height_mm / height_px as f32);
        (width_px as f32 * scale, height_px as f32 * scale)
    }

    /// 画像の左端X座標（mm）。中央揃え
    pub fn centered_x_mm(&self, width_mm: f32) -> f32 {
        (self.page_width_mm - width_mm) / 2.0
    }
}

// ============================================
// ヘルパー関数
// ============================================

/// 単語単位でテキストを折り返す
///
/// 1単語が max_chars を超える場合はその単語だけで1行にする
pub fn wrap_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current_len > 0 && current_len + 1 + word_len > max_chars {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        lines.push(current);
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions() {
        assert!((USABLE_WIDTH_MM - 160.0).abs() < 0.01);
        assert!((IMAGE_MAX_WIDTH_MM - 101.6).abs() < 0.01);
        assert!((IMAGE_MAX_HEIGHT_MM - 76.2).abs() < 0.01);
    }

    #[test]
    fn test_conversion() {
        assert!((MM_TO_PT - 2.835).abs() < 0.01);
        assert!((mm_to_pt(10.0) - 28.35).abs() < 0.1);
        assert!((pt_to_mm(mm_to_pt(42.0)) - 42.0).abs() < 0.001);
    }

    #[test]
    fn test_fit_image_keeps_ratio() {
        let layout = BrochureLayout::default();

        // 横長: 幅で制限
        let (w, h) = layout.fit_image(2000, 1000);
        assert!((w - IMAGE_MAX_WIDTH_MM).abs() < 0.01);
        assert!((h - IMAGE_MAX_WIDTH_MM / 2.0).abs() < 0.01);

        // 縦長: 高さで制限
        let (w, h) = layout.fit_image(1000, 2000);
        assert!((h - IMAGE_MAX_HEIGHT_MM).abs() < 0.01);
        assert!((w - IMAGE_MAX_HEIGHT_MM / 2.0).abs() < 0.01);

        assert_eq!(layout.fit_image(0, 10), (0.0, 0.0));
    }

    #[test]
    fn test_wrap_text() {
        let lines = wrap_text("one two three four five", 9);
        assert_eq!(lines, vec!["one two", "three", "four five"]);
    }

    #[test]
    fn test_wrap_text_long_word_and_empty() {
        assert_eq!(wrap_text("Halbedelstein-Sammlung ok", 5), vec!["Halbedelstein-Sammlung", "ok"]);
        assert!(wrap_text("   ", 10).is_empty());
    }

    #[test]
    fn test_chars_per_line_positive() {
        let layout = BrochureLayout::default();
        let body = layout.chars_per_line(BODY_FONT_PT);
        let title = layout.chars_per_line(TITLE_FONT_PT);
        assert!(body > title);
        assert!(title >= 1);
    }
}
