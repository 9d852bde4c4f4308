//! 解析パイプライン（アグリゲーター）
//!
//! 画像を1枚ずつ `Pending → Analyzing → (Retrying → Analyzing)* → Parsed | Failed`
//! の状態遷移で処理し、成功は CombinedResults に、失敗は FailureEntry に集める。
//! 並列数を上げても結果は入力順のまま。

use super::cache::{compute_hash, CacheFile};
use super::retry::RetryPolicy;
use super::AnalysisClient;
use crate::error::GemAiError;
use crate::scanner::{ImageSource, ScannedImage};
use futures::stream::{self, StreamExt};
use gem_ai_common::{
    build_gemstone_prompt, parse_analysis_response, AnalysisResult, CombinedResults, FailureEntry,
    FailureKind, SummaryReport,
};
use indicatif::ProgressBar;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// 中断フラグ（Ctrl+C で立てる）
///
/// `cancelled()` で待っているタスクは `cancel()` 時に起こされる。
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<CancelInner>);

#[derive(Debug, Default)]
struct CancelInner {
    flag: AtomicBool,
    notify: Notify,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.flag.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.flag.load(Ordering::SeqCst)
    }

    /// 中断されるまで待つ
    pub async fn cancelled(&self) {
        let notified = self.0.notify.notified();
        tokio::pin!(notified);
        // フラグ確認より先に登録しておかないと通知を取りこぼす
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// 1画像の処理状態
#[derive(Debug)]
pub enum ImageState {
    Pending,
    Analyzing { attempt: u32 },
    Retrying { attempt: u32, delay: Duration },
    Parsed(AnalysisResult),
    Failed(FailureEntry),
    /// 中断により途中で放棄（結果にも失敗にも数えない）
    Abandoned,
}

impl ImageState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ImageState::Parsed(_) | ImageState::Failed(_) | ImageState::Abandoned
        )
    }

    /// attempt 回目の応答から次の状態を決める
    pub fn after_attempt(
        attempt: u32,
        response: crate::error::Result<String>,
        image_filename: &str,
        policy: &RetryPolicy,
    ) -> ImageState {
        match response {
            Ok(text) => match parse_analysis_response(&text, image_filename) {
                Ok(result) => ImageState::Parsed(result),
                Err(e) => ImageState::Failed(FailureEntry::new(
                    image_filename,
                    FailureKind::MalformedResponse,
                    e.to_string(),
                )),
            },
            Err(GemAiError::RateLimited { retry_after, .. }) if policy.can_retry(attempt) => {
                ImageState::Retrying {
                    attempt,
                    delay: policy.delay_for(attempt, retry_after),
                }
            }
            Err(e) => {
                let kind = e.failure_kind().unwrap_or(FailureKind::Transport);
                let message = if e.is_rate_limited() {
                    format!("{} ({}回試行)", e, attempt)
                } else {
                    e.to_string()
                };
                ImageState::Failed(FailureEntry::new(image_filename, kind, message))
            }
        }
    }
}

/// 実行オプション
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub max_images: Option<usize>,
    /// 同時解析数（1 なら逐次）
    pub concurrency: usize,
    pub retry: RetryPolicy,
    /// 実行開始時に一度だけ決める日付（YYYY-MM-DD）
    pub analysis_date: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_images: None,
            concurrency: 1,
            retry: RetryPolicy::default(),
            analysis_date: String::new(),
        }
    }
}

/// 実行結果
#[derive(Debug)]
pub struct RunOutcome {
    pub combined: CombinedResults,
    pub failures: Vec<FailureEntry>,
    pub summary: SummaryReport,
    /// 新しい解析結果を追加済みのキャッシュ
    pub cache: Option<CacheFile>,
}

struct ImageOutcome {
    state: ImageState,
    /// キャッシュに追加すべき (ハッシュ, サイズ)
    cache_entry: Option<(String, u64)>,
}

struct RunContext<'a, C> {
    client: &'a C,
    prompt: &'a str,
    retry: &'a RetryPolicy,
    cache: Option<&'a CacheFile>,
    cancel: &'a CancelFlag,
}

pub struct Aggregator<C> {
    client: C,
    options: RunOptions,
    prompt: &'static str,
    cache: Option<CacheFile>,
    progress: ProgressBar,
    cancel: CancelFlag,
}

impl<C: AnalysisClient> Aggregator<C> {
    pub fn new(client: C, options: RunOptions) -> Self {
        Self {
            client,
            options,
            prompt: build_gemstone_prompt(),
            cache: None,
            progress: ProgressBar::hidden(),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cache(mut self, cache: CacheFile) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// 入力フォルダの画像を解析
    pub async fn run(self, source: &ImageSource) -> RunOutcome {
        self.run_images(source.iter()).await
    }

    /// 任意の画像列を解析（入力順を保つ）
    pub async fn run_images<I>(self, images: I) -> RunOutcome
    where
        I: IntoIterator<Item = ScannedImage>,
    {
        let Aggregator {
            client,
            options,
            prompt,
            mut cache,
            progress,
            cancel,
        } = self;

        let mut combined = CombinedResults::new(options.analysis_date.clone());
        let mut failures = Vec::new();
        let mut new_entries: Vec<(String, u64, AnalysisResult)> = Vec::new();

        {
            let ctx = RunContext {
                client: &client,
                prompt,
                retry: &options.retry,
                cache: cache.as_ref(),
                cancel: &cancel,
            };

            let limit = options.max_images.unwrap_or(usize::MAX);
            let start_guard = cancel.clone();
            let pending = images
                .into_iter()
                .take(limit)
                .take_while(move |_| !start_guard.is_cancelled());

            let mut outcomes = stream::iter(pending)
                .map(|image| analyze_image(&ctx, image))
                .buffered(options.concurrency.max(1));

            while let Some(outcome) = outcomes.next().await {
                match outcome.state {
                    ImageState::Parsed(result) => {
                        progress.set_message(result.image_filename.clone());
                        if let Some((hash, size)) = outcome.cache_entry {
                            new_entries.push((hash, size, result.clone()));
                        }
                        let file_name = result.image_filename.clone();
                        if !combined.push(result) {
                            tracing::warn!(file = %file_name, "同名の結果が既にあるためスキップ");
                        }
                    }
                    ImageState::Failed(failure) => {
                        progress.set_message(failure.image_filename.clone());
                        tracing::warn!(
                            file = %failure.image_filename,
                            kind = %failure.kind,
                            "解析失敗: {}",
                            failure.message
                        );
                        failures.push(failure);
                    }
                    _ => {}
                }
                progress.inc(1);

                if cancel.is_cancelled() {
                    tracing::warn!("中断要求を受けたため残りの画像をスキップ");
                    break;
                }
            }
        }

        if let Some(cache) = cache.as_mut() {
            for (hash, size, result) in new_entries {
                cache.insert(hash, size, result);
            }
        }

        progress.finish_and_clear();

        let interrupted = cancel.is_cancelled();
        let summary = SummaryReport::from_run(&combined, &failures, interrupted);
        tracing::info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            interrupted,
            "解析完了"
        );

        RunOutcome {
            combined,
            failures,
            summary,
            cache,
        }
    }
}

/// 1画像を終端状態まで進める
async fn analyze_image<C: AnalysisClient>(ctx: &RunContext<'_, C>, image: ScannedImage) -> ImageOutcome {
    let ScannedImage { info, bytes } = image;
    let file_name = info.file_name;

    let bytes = match bytes {
        Ok(bytes) => bytes,
        Err(e) => {
            return ImageOutcome {
                state: ImageState::Failed(FailureEntry::new(
                    &file_name,
                    FailureKind::Read,
                    e.to_string(),
                )),
                cache_entry: None,
            }
        }
    };

    let hash = ctx.cache.map(|_| compute_hash(&bytes));
    if let (Some(cache), Some(hash)) = (ctx.cache, hash.as_deref()) {
        if let Some(hit) = cache.get(hash, bytes.len() as u64, &file_name) {
            tracing::debug!(file = %file_name, "キャッシュヒット");
            return ImageOutcome {
                state: ImageState::Parsed(hit),
                cache_entry: None,
            };
        }
    }

    let mime_type = info.format.mime_type();
    let mut state = ImageState::Pending;
    let state = loop {
        state = match state {
            ImageState::Pending => ImageState::Analyzing { attempt: 1 },
            ImageState::Analyzing { attempt } => {
                tracing::debug!(file = %file_name, attempt, "解析中");
                let response = ctx.client.analyze(&bytes, mime_type, ctx.prompt).await;
                ImageState::after_attempt(attempt, response, &file_name, ctx.retry)
            }
            ImageState::Retrying { attempt, delay } => {
                if ctx.cancel.is_cancelled() {
                    ImageState::Abandoned
                } else {
                    tracing::warn!(
                        file = %file_name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "レート制限、待機後に再試行"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = ctx.cancel.cancelled() => {}
                    }
                    if ctx.cancel.is_cancelled() {
                        tracing::warn!(file = %file_name, "待機中に中断されたため再試行しない");
                        ImageState::Abandoned
                    } else {
                        ImageState::Analyzing { attempt: attempt + 1 }
                    }
                }
            }
            done => break done,
        };
    };

    let cache_entry = match (&state, hash) {
        (ImageState::Parsed(_), Some(hash)) => Some((hash, bytes.len() as u64)),
        _ => None,
    };

    ImageOutcome { state, cache_entry }
}
