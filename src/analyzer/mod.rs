pub mod cache;
mod openai;
mod pipeline;
mod retry;

pub use gem_ai_common::AnalysisResult;
pub use openai::OpenAiClient;
pub use pipeline::{Aggregator, CancelFlag, ImageState, RunOptions, RunOutcome};
pub use retry::RetryPolicy;

use crate::error::Result;

/// 画像解析サービス
///
/// 画像1枚とプロンプトを送り、モデルの応答テキストをそのまま返す。
/// 429 は `GemAiError::RateLimited`、その他の通信失敗は `GemAiError::Transport` で返すこと。
#[allow(async_fn_in_trait)]
pub trait AnalysisClient {
    async fn analyze(&self, image: &[u8], mime_type: &str, prompt: &str) -> Result<String>;
}

impl<T: AnalysisClient + ?Sized> AnalysisClient for &T {
    async fn analyze(&self, image: &[u8], mime_type: &str, prompt: &str) -> Result<String> {
        (**self).analyze(image, mime_type, prompt).await
    }
}
