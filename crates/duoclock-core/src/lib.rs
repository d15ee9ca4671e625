//! # duoclock-core
//!
//! 2 人用の対局時計エンジン。切れ負け・フィッシャー・秒読みに対応する。
//!
//! ## モジュール構成
//!
//! - `types`: 基本型（Player, TimeControlMode）
//! - `config`: 持ち時間設定と TOML 読み込み
//! - `state`: 状態スナップショット（ClockState, PlayerClock）
//! - `event`: 閾値通知・時間切れなどのイベント
//! - `time_source`: 時刻源（実時間 / 手動 / tokio）
//! - `engine`: 状態機械本体（制御操作と advance）
//! - `command`: 制御操作の値表現
//! - `driver`: tokio 上の単一 owner actor（feature `tokio-driver`）
//!

pub mod types;

pub mod config;
pub mod state;

pub mod command;
pub mod event;
pub mod time_source;

pub mod engine;

#[cfg(feature = "tokio-driver")]
pub mod driver;

pub use command::ClockCommand;
pub use config::{ClockConfig, ConfigError, PlayerSettings, ResetPolicy, SelectPolicy};
pub use engine::{ClockEngine, TickToken};
pub use event::{ClockEvent, EventCallback};
pub use state::{ClockState, InvariantViolation, PlayerClock};
pub use time_source::{ManualSource, MonotonicSource, TimeSource};
pub use types::{ParseKindError, Player, TimeControlMode};

#[cfg(feature = "tokio-driver")]
pub use driver::{ClockHandle, DriverError};
#[cfg(feature = "tokio-driver")]
pub use time_source::TokioSource;
