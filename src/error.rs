use gem_ai_common::FailureKind;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GemAiError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("APIキーが設定されていません。環境変数 OPENAI_API_KEY（.env 可）か `gem-ai config --set-api-key YOUR_KEY` で設定してください")]
    MissingApiKey,

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    /// 入力フォルダが存在しない（処理開始前に中断）
    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("画像読み込みエラー: {0}")]
    ImageLoad(String),

    /// ネットワーク・認証・HTTPエラー
    #[error("API通信エラー: {0}")]
    Transport(String),

    /// 利用上限（HTTP 429）
    #[error("APIレート制限: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("書き込みエラー ({}): {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 大文字小文字を無視すると同名になる出力ファイル
    #[error("出力ファイル名が衝突しています: {} ({first} と {second})", .path.display())]
    OutputCollision {
        path: PathBuf,
        first: String,
        second: String,
    },

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF生成エラー: {0}")]
    PdfGeneration(String),

    #[error("Excel生成エラー: {0}")]
    ExcelGeneration(String),

    #[error("画像が見つかりません: {0}")]
    NoImagesFound(String),

    #[error(transparent)]
    Common(#[from] gem_ai_common::Error),
}

impl GemAiError {
    /// 画像単位の失敗として記録する場合の種別
    ///
    /// 実行全体を止めるべきエラー（フォルダなし等）は None
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            GemAiError::Transport(_) | GemAiError::RateLimited { .. } => Some(FailureKind::Transport),
            GemAiError::Common(gem_ai_common::Error::MalformedResponse(_)) => {
                Some(FailureKind::MalformedResponse)
            }
            GemAiError::ImageLoad(_) => Some(FailureKind::Read),
            GemAiError::Write { .. } | GemAiError::OutputCollision { .. } => Some(FailureKind::Write),
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GemAiError::RateLimited { .. })
    }
}

pub type Result<T> = std::result::Result<T, GemAiError>;
