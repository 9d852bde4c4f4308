use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gem-ai")]
#[command(about = "宝石画像AI解析・二か国語ブローシャー生成ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 画像フォルダを解析してJSONを出力
    Analyze {
        /// 画像フォルダのパス
        #[arg(required = true)]
        folder: PathBuf,

        /// 出力フォルダ（デフォルト: 入力フォルダ/output）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 解析する最大枚数
        #[arg(short = 'n', long)]
        max_images: Option<usize>,

        /// 同時に解析する枚数
        #[arg(short, long, default_value = "1")]
        concurrency: usize,

        /// キャッシュを使用（再解析をスキップ）
        #[arg(long)]
        use_cache: bool,

        /// 課金確認をスキップ
        #[arg(short, long)]
        yes: bool,
    },

    /// 解析結果からブローシャー（PDF/Excel）を生成
    Brochure {
        /// 統合結果JSONファイル（combined_gemstone_analysis.json）
        #[arg(required = true)]
        input: PathBuf,

        /// 出力形式 (pdf/excel/both)
        #[arg(short, long, default_value = "pdf")]
        format: ExportFormat,

        /// 出力ファイル/ディレクトリ
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 画像フォルダ（省略時は入力JSONの親フォルダの親）
        #[arg(short, long)]
        images: Option<PathBuf>,

        /// 表紙とメタデータのタイトル
        #[arg(short, long, default_value = "Semi-Precious Gemstone Collection")]
        title: String,

        /// PDF画像品質 (high/medium/low)
        #[arg(long, default_value = "medium")]
        pdf_quality: PdfQuality,
    },

    /// 解析からブローシャー出力まで一括実行
    Run {
        /// 画像フォルダのパス
        #[arg(required = true)]
        folder: PathBuf,

        /// 出力フォルダ（デフォルト: 入力フォルダ/output）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// 出力形式 (pdf/excel/both)
        #[arg(short, long, default_value = "pdf")]
        format: ExportFormat,

        /// 解析する最大枚数
        #[arg(short = 'n', long)]
        max_images: Option<usize>,

        /// 同時に解析する枚数
        #[arg(short, long, default_value = "1")]
        concurrency: usize,

        /// PDF画像品質 (high/medium/low)
        #[arg(long, default_value = "medium")]
        pdf_quality: PdfQuality,

        /// キャッシュを使用（再解析をスキップ）
        #[arg(long)]
        use_cache: bool,

        /// 課金確認をスキップ
        #[arg(short, long)]
        yes: bool,
    },

    /// 設定を表示/編集
    Config {
        /// APIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },

    /// キャッシュ管理
    Cache {
        /// キャッシュを削除
        #[arg(long)]
        clear: bool,

        /// 対象フォルダ（省略時はカレント）
        #[arg(short, long)]
        folder: Option<PathBuf>,

        /// キャッシュ情報を表示
        #[arg(long)]
        info: bool,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Pdf,
    Excel,
    Both,
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(ExportFormat::Pdf),
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            "both" => Ok(ExportFormat::Both),
            _ => Err(format!("Unknown format: {}. Use pdf, excel, or both", s)),
        }
    }
}

/// PDF画像品質設定
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PdfQuality {
    /// 高品質: 長辺1400px
    High,
    /// 中品質: 長辺800px（デフォルト）
    #[default]
    Medium,
    /// 低品質: 長辺500px
    Low,
}

impl PdfQuality {
    /// 埋め込み画像の長辺の最大ピクセル数
    pub fn max_pixels(&self) -> u32 {
        match self {
            PdfQuality::High => 1400,
            PdfQuality::Medium => 800,
            PdfQuality::Low => 500,
        }
    }
}

impl std::str::FromStr for PdfQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high" | "h" => Ok(PdfQuality::High),
            "medium" | "med" | "m" => Ok(PdfQuality::Medium),
            "low" | "l" => Ok(PdfQuality::Low),
            _ => Err(format!("Unknown quality: {}. Use high, medium, or low", s)),
        }
    }
}

impl std::fmt::Display for PdfQuality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PdfQuality::High => write!(f, "high"),
            PdfQuality::Medium => write!(f, "medium"),
            PdfQuality::Low => write!(f, "low"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_analyze_options() {
        let cli = Cli::parse_from([
            "gem-ai", "analyze", "gems", "-n", "5", "--concurrency", "3", "--use-cache", "--yes",
        ]);
        match cli.command {
            Commands::Analyze {
                folder,
                max_images,
                concurrency,
                use_cache,
                yes,
                ..
            } => {
                assert_eq!(folder, PathBuf::from("gems"));
                assert_eq!(max_images, Some(5));
                assert_eq!(concurrency, 3);
                assert!(use_cache);
                assert!(yes);
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_format_and_quality_parse() {
        assert_eq!("XLSX".parse::<ExportFormat>().unwrap(), ExportFormat::Excel);
        assert!("docx".parse::<ExportFormat>().is_err());
        assert_eq!("h".parse::<PdfQuality>().unwrap(), PdfQuality::High);
        assert_eq!(PdfQuality::Low.to_string(), "low");
    }
}
