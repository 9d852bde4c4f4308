//! OpenAI API 実呼び出しテスト
//!
//! OPENAI_API_KEY が無ければスキップする

use gem_ai_common::{build_gemstone_prompt, parse_analysis_response};
use gem_ai_rust::analyzer::{AnalysisClient, OpenAiClient};
use gem_ai_rust::config::Config;
use std::io::Cursor;

/// 単色の小さなPNG
fn sample_png() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(64, 64, image::Rgb([120, 40, 160]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
        .expect("PNGエンコード失敗");
    bytes
}

#[tokio::test]
async fn openai_gemstone_integration() {
    dotenvy::dotenv().ok();
    let config = Config::default();
    if !config.has_api_key() {
        eprintln!("OPENAI_API_KEY not set; skipping integration test");
        return;
    }

    let client = OpenAiClient::new(&config).expect("client");
    let text = client
        .analyze(&sample_png(), "image/png", build_gemstone_prompt())
        .await
        .expect("request failed");

    let result = parse_analysis_response(&text, "integration-test.png").expect("failed to parse response");
    assert_eq!(result.image_filename, "integration-test.png");
    assert!(result.english.confidence <= 100);
    assert!(result.german.confidence <= 100);
}
