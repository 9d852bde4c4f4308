//! Gemstone AI Common Library
//!
//! CLIと各エクスポートで共有される型とユーティリティ

pub mod types;
pub mod layout;
pub mod error;
pub mod prompts;
pub mod parser;
pub mod summary;
pub mod export;

pub use types::{AnalysisResult, CombinedResults, FailureEntry, FailureKind, GemstoneRecord};
pub use layout::BrochureLayout;
pub use error::{Error, Result};
pub use prompts::{build_gemstone_prompt, gemstone_response_schema, SCHEMA_NAME};
pub use parser::{extract_json_candidates, parse_analysis_payload, parse_analysis_response};
pub use summary::SummaryReport;
