//! # duoclock-cli
//!
//! `duoclock` バイナリの部品。
//!
//! - `args`: コマンドライン引数と設定の上書き
//! - `input`: 標準入力の 1 行コマンド解析
//! - `render`: 状態・イベントの表示
//! - `session`: driver と入出力をつなぐ対話ループ
//! - `logging`: tracing subscriber の初期化

pub mod args;
pub mod input;
pub mod logging;
pub mod render;
pub mod session;

pub use args::Cli;
pub use input::{parse_line, Input, ParseCommandError};
pub use session::{run_session, SessionOptions};
