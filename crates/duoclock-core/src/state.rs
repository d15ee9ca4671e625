//! 時計の状態スナップショット
//!
//! `ClockState` は engine が所有する唯一の状態で、各操作の戻り値としては
//! `Copy` された不変のスナップショットを返す。表示側はこれを読むだけで、
//! 書き換えても engine には影響しない。

use std::time::Duration;

use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::config::{ClockConfig, PlayerSettings};
use crate::types::{Player, TimeControlMode};

/// `Duration` をミリ秒の整数で書き出す（u64 を超える分は飽和）
pub(crate) fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis().min(u64::MAX as u128) as u64)
}

/// 対局者 1 人分の時計
///
/// `main_time` / `additional_time` / `byoyomi_periods` は設定値、
/// それ以外は対局中に変化する値。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlayerClock {
    #[serde(rename = "main_time_ms", serialize_with = "serialize_millis")]
    pub main_time: Duration,
    #[serde(rename = "additional_time_ms", serialize_with = "serialize_millis")]
    pub additional_time: Duration,
    pub byoyomi_periods: u32,
    /// 現在のフェーズ（持ち時間または秒読みの 1 期間）の残り
    #[serde(rename = "current_time_ms", serialize_with = "serialize_millis")]
    pub current_time: Duration,
    pub is_running: bool,
    /// 持ち時間を使い切って秒読みに入っているか
    pub in_byoyomi: bool,
    /// 残り期間数（`byoyomi_periods` から減っていく）
    pub periods_left: u32,
}

impl PlayerClock {
    pub fn new(settings: &PlayerSettings, mode: TimeControlMode) -> Self {
        let mut clock = Self {
            main_time: settings.main_time(),
            additional_time: settings.additional_time(),
            byoyomi_periods: settings.byoyomi_periods,
            current_time: Duration::ZERO,
            is_running: false,
            in_byoyomi: false,
            periods_left: 0,
        };
        clock.rearm(mode);
        clock
    }

    /// 設定値から対局中の値を初期化し直す
    ///
    /// 秒読みで持ち時間 0 の場合は最初から秒読みに入った状態にする。
    pub fn rearm(&mut self, mode: TimeControlMode) {
        self.periods_left = self.byoyomi_periods;
        if mode == TimeControlMode::Byoyomi && self.main_time.is_zero() && self.byoyomi_periods > 0
        {
            self.in_byoyomi = true;
            self.current_time = self.additional_time;
        } else {
            self.in_byoyomi = false;
            self.current_time = self.main_time;
        }
    }

    /// 設定値のみを取り出す
    pub fn settings(&self) -> PlayerSettings {
        PlayerSettings {
            main_time_secs: self.main_time.as_secs(),
            additional_time_secs: self.additional_time.as_secs(),
            byoyomi_periods: self.byoyomi_periods,
        }
    }

    /// 消費済みの期間数
    pub fn periods_used(&self) -> u32 {
        self.byoyomi_periods.saturating_sub(self.periods_left)
    }

    /// 残り時間も補充手段も無いか
    pub fn is_exhausted(&self) -> bool {
        self.current_time.is_zero() && (!self.in_byoyomi || self.periods_left == 0)
    }
}

/// 不変条件違反（テストとデバッグビルドの検査用）
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("player {0} is running while the game is paused or not on move")]
    StrayRunning(Player),
    #[error("game is running but the active player's clock is stopped")]
    ActiveNotRunning,
    #[error("game is running without an active player")]
    RunningWithoutActive,
    #[error("flag has fallen but the clock is still running")]
    RunningAfterFlag,
    #[error("flagged player is set without a flag-fall")]
    FlaggedWithoutFlag,
}

/// 時計全体の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClockState {
    pub players: [PlayerClock; Player::NUM],
    pub mode: TimeControlMode,
    pub active_player: Option<Player>,
    pub is_game_running: bool,
    /// 時間切れ。reset するまで解除されない。
    pub is_flag_fallen: bool,
    pub flagged_player: Option<Player>,
    /// 直近の reset / モード変更以降に一度でも start されたか
    pub is_game_started: bool,
    /// 走行状態が変わるたびに増える世代番号
    pub epoch: u64,
}

impl ClockState {
    pub fn new(config: &ClockConfig) -> Self {
        Self {
            players: Player::ALL.map(|p| PlayerClock::new(config.player(p), config.mode)),
            mode: config.mode,
            active_player: Some(config.first_player),
            is_game_running: false,
            is_flag_fallen: false,
            flagged_player: None,
            is_game_started: false,
            epoch: 0,
        }
    }

    #[inline]
    pub fn player(&self, player: Player) -> &PlayerClock {
        &self.players[player.index()]
    }

    #[inline]
    pub(crate) fn player_mut(&mut self, player: Player) -> &mut PlayerClock {
        &mut self.players[player.index()]
    }

    /// 時計を動かしている対局者
    pub fn running_player(&self) -> Option<Player> {
        Player::ALL.into_iter().find(|p| self.player(*p).is_running)
    }

    pub fn check_invariants(&self) -> Result<(), InvariantViolation> {
        for p in Player::ALL {
            let running = self.player(p).is_running;
            let expected = self.is_game_running && self.active_player == Some(p);
            if running && !expected {
                return Err(InvariantViolation::StrayRunning(p));
            }
            if expected && !running {
                return Err(InvariantViolation::ActiveNotRunning);
            }
        }
        if self.is_game_running && self.active_player.is_none() {
            return Err(InvariantViolation::RunningWithoutActive);
        }
        if self.is_flag_fallen && (self.is_game_running || self.running_player().is_some()) {
            return Err(InvariantViolation::RunningAfterFlag);
        }
        if self.flagged_player.is_some() && !self.is_flag_fallen {
            return Err(InvariantViolation::FlaggedWithoutFlag);
        }
        Ok(())
    }
}
