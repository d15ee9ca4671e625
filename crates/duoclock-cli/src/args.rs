//! コマンドライン引数
//!
//! `--config` の TOML を土台に、個別フラグで両対局者の設定を上書きする。

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use duoclock_core::{ClockConfig, ConfigError, Player, TimeControlMode};

/// 2 人用の対局時計を端末で動かす。
///
/// 標準入力から 1 行 1 コマンドで操作する（`help` で一覧）。
/// 空行は手番交代として扱う。
///
/// # 例
///
/// - 5 分切れ負け: `duoclock --mode absolute --main 5:00`
/// - 3 分 + 10 秒加算: `duoclock --mode fischer --main 3:00 --additional 10`
/// - 10 分 + 30 秒 5 回: `duoclock --mode byoyomi --main 10:00 --additional 30 --periods 5`
#[derive(Parser, Debug, Default)]
#[command(
    author,
    version,
    about = "duoclock: two-player game clock (absolute / Fischer / byoyomi)"
)]
pub struct Cli {
    /// TOML config file (flags below override it)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Time control mode: absolute, fischer or byoyomi
    #[arg(long)]
    pub mode: Option<TimeControlMode>,

    /// Main time for both players, as M:SS or plain seconds
    #[arg(long, value_parser = parse_main_time)]
    pub main: Option<u64>,

    /// Fischer increment or byoyomi period length in seconds
    #[arg(long)]
    pub additional: Option<u64>,

    /// Number of byoyomi periods
    #[arg(long)]
    pub periods: Option<u32>,

    /// Tick interval of the clock driver in milliseconds
    #[arg(long)]
    pub tick_ms: Option<u64>,

    /// Print a status line at this interval while the clock runs (0 = off)
    #[arg(long, default_value_t = 1000)]
    pub refresh_ms: u64,

    /// Emit snapshots and events as JSON lines
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

impl Cli {
    /// 設定ファイルと上書きフラグから検証済みの設定を作る
    pub fn clock_config(&self) -> Result<ClockConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ClockConfig::load(path)?,
            None => ClockConfig::default(),
        };
        self.apply_overrides(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// 指定されたフラグだけを両対局者に反映する
    pub fn apply_overrides(&self, config: &mut ClockConfig) {
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        for player in Player::ALL {
            let settings = config.player_mut(player);
            if let Some(main) = self.main {
                settings.main_time_secs = main;
            }
            if let Some(additional) = self.additional {
                settings.additional_time_secs = additional;
            }
            if let Some(periods) = self.periods {
                settings.byoyomi_periods = periods;
            }
        }
        if let Some(tick_ms) = self.tick_ms {
            config.tick_interval_ms = tick_ms;
        }
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_ms > 0).then(|| Duration::from_millis(self.refresh_ms))
    }
}

/// `M:SS`（分:秒）または秒数のみを秒に変換する
pub fn parse_main_time(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let parse = |part: &str| {
        part.parse::<u64>()
            .map_err(|_| format!("invalid main time `{s}` (expected M:SS or seconds)"))
    };
    match s.split_once(':') {
        Some((minutes, seconds)) => {
            let minutes = parse(minutes)?;
            let seconds = parse(seconds)?;
            if seconds >= 60 {
                return Err(format!("seconds must be below 60 in `{s}`"));
            }
            minutes
                .checked_mul(60)
                .and_then(|m| m.checked_add(seconds))
                .ok_or_else(|| format!("main time `{s}` is too large"))
        }
        None => parse(s),
    }
}
