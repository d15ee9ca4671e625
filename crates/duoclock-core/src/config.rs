//! 時計の設定
//!
//! `ClockConfig` は TOML から読み込める純粋な設定型で、engine の生成時と
//! リセット方針・通知閾値の参照にのみ使う。対局中に変わる値（残り時間など）は
//! `ClockState` 側で管理する。

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::types::{Player, TimeControlMode};

/// 設定値の既定値と検証範囲
pub mod constants {
    pub const DEFAULT_MAIN_TIME_SECS: u64 = 5 * 60;
    pub const DEFAULT_ADDITIONAL_TIME_SECS: u64 = 30;
    pub const DEFAULT_BYOYOMI_PERIODS: u32 = 3;
    pub const DEFAULT_TICK_INTERVAL_MS: u64 = 100;
    pub const DEFAULT_ALERT_THRESHOLDS_SECS: [u64; 3] = [30, 10, 5];

    pub const MIN_TICK_INTERVAL_MS: u64 = 10;
    pub const MAX_TICK_INTERVAL_MS: u64 = 1000;
}

/// 対局者ごとの持ち時間設定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    pub main_time_secs: u64,
    /// フィッシャーの加算秒、または秒読み 1 期間の秒数
    pub additional_time_secs: u64,
    pub byoyomi_periods: u32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            main_time_secs: constants::DEFAULT_MAIN_TIME_SECS,
            additional_time_secs: constants::DEFAULT_ADDITIONAL_TIME_SECS,
            byoyomi_periods: constants::DEFAULT_BYOYOMI_PERIODS,
        }
    }
}

impl PlayerSettings {
    pub fn main_time(&self) -> Duration {
        Duration::from_secs(self.main_time_secs)
    }

    pub fn additional_time(&self) -> Duration {
        Duration::from_secs(self.additional_time_secs)
    }
}

/// リセット時の手番の扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResetPolicy {
    /// 直前の手番を維持する
    #[default]
    KeepActive,
    /// 手番を未選択に戻す（次の start で 1 が手番になる）
    Clear,
}

/// 対局中に手番を直接指定したときの扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectPolicy {
    /// 時計を止め、明示的な start を待つ
    #[default]
    RequireStart,
    /// 新しい手番の時計をそのまま動かし続ける（加算・秒読みの補充はしない）
    ResumeImmediately,
}

/// 時計全体の設定
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    pub mode: TimeControlMode,
    pub player1: PlayerSettings,
    pub player2: PlayerSettings,
    /// 起動直後の手番
    pub first_player: Player,
    /// 外部スケジューラが advance を呼ぶ周期
    pub tick_interval_ms: u64,
    /// 残り時間がこの秒数を跨いだときに `ThresholdCrossed` を通知する
    pub alert_thresholds_secs: Vec<u64>,
    pub reset_policy: ResetPolicy,
    pub select_policy: SelectPolicy,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            mode: TimeControlMode::default(),
            player1: PlayerSettings::default(),
            player2: PlayerSettings::default(),
            first_player: Player::One,
            tick_interval_ms: constants::DEFAULT_TICK_INTERVAL_MS,
            alert_thresholds_secs: constants::DEFAULT_ALERT_THRESHOLDS_SECS.to_vec(),
            reset_policy: ResetPolicy::default(),
            select_policy: SelectPolicy::default(),
        }
    }
}

/// 設定の読み込み・検証エラー
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("tick interval must be between {min} and {max} ms, got {value}")]
    TickInterval { value: u64, min: u64, max: u64 },
    #[error("alert thresholds must be positive")]
    ZeroThreshold,
    #[error("failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ClockConfig {
    /// 両者に同じ持ち時間を設定した構成を返す
    pub fn symmetric(mode: TimeControlMode, settings: PlayerSettings) -> Self {
        Self {
            mode,
            player1: settings,
            player2: settings,
            ..Self::default()
        }
    }

    pub fn player(&self, player: Player) -> &PlayerSettings {
        match player {
            Player::One => &self.player1,
            Player::Two => &self.player2,
        }
    }

    pub fn player_mut(&mut self, player: Player) -> &mut PlayerSettings {
        match player {
            Player::One => &mut self.player1,
            Player::Two => &mut self.player2,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// 通知閾値（降順・重複なし）
    pub fn alert_thresholds(&self) -> Vec<Duration> {
        let mut secs = self.alert_thresholds_secs.clone();
        secs.sort_unstable_by(|a, b| b.cmp(a));
        secs.dedup();
        secs.into_iter().map(Duration::from_secs).collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(constants::MIN_TICK_INTERVAL_MS..=constants::MAX_TICK_INTERVAL_MS)
            .contains(&self.tick_interval_ms)
        {
            return Err(ConfigError::TickInterval {
                value: self.tick_interval_ms,
                min: constants::MIN_TICK_INTERVAL_MS,
                max: constants::MAX_TICK_INTERVAL_MS,
            });
        }
        if self.alert_thresholds_secs.contains(&0) {
            return Err(ConfigError::ZeroThreshold);
        }
        Ok(())
    }

    /// TOML 文字列から読み込み、検証する
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: ClockConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML ファイルから読み込み、検証する
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ClockConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mode, TimeControlMode::Byoyomi);
        assert_eq!(config.player1.main_time(), Duration::from_secs(300));
        assert_eq!(config.tick_interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config = ClockConfig::from_toml_str(
            r#"
mode = "fischer"
reset_policy = "clear"

[player2]
main_time_secs = 600
"#,
        )
        .unwrap();
        assert_eq!(config.mode, TimeControlMode::Fischer);
        assert_eq!(config.reset_policy, ResetPolicy::Clear);
        assert_eq!(config.player1, PlayerSettings::default());
        assert_eq!(config.player2.main_time_secs, 600);
        assert_eq!(config.player2.byoyomi_periods, constants::DEFAULT_BYOYOMI_PERIODS);
    }

    #[test]
    fn test_first_player_and_select_policy_from_toml() {
        let config = ClockConfig::from_toml_str(
            r#"
first_player = "2"
select_policy = "resume-immediately"
"#,
        )
        .unwrap();
        assert_eq!(config.first_player, Player::Two);
        assert_eq!(config.select_policy, SelectPolicy::ResumeImmediately);
    }

    #[test]
    fn test_tick_interval_out_of_range_is_rejected() {
        let err = ClockConfig::from_toml_str("tick_interval_ms = 5000").unwrap_err();
        assert!(matches!(err, ConfigError::TickInterval { value: 5000, .. }));
    }

    #[test]
    fn test_zero_threshold_is_rejected() {
        let err = ClockConfig::from_toml_str("alert_thresholds_secs = [10, 0]").unwrap_err();
        assert!(matches!(err, ConfigError::ZeroThreshold));
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let err = ClockConfig::from_toml_str("mode = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_alert_thresholds_sorted_descending() {
        let config = ClockConfig {
            alert_thresholds_secs: vec![5, 30, 10, 5],
            ..ClockConfig::default()
        };
        assert_eq!(
            config.alert_thresholds(),
            vec![Duration::from_secs(30), Duration::from_secs(10), Duration::from_secs(5)]
        );
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let err = ClockConfig::load(Path::new("/nonexistent/duoclock.toml")).unwrap_err();
        match err {
            ConfigError::Io { path, .. } => {
                assert_eq!(path, PathBuf::from("/nonexistent/duoclock.toml"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
