//! gem-ai: 宝石画像をAIで解析し、二か国語（英・独）の結果とブローシャーを出力する

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod scanner;
