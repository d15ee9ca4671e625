//! 対局時計エンジン
//!
//! 両対局者の残り時間・手番・走行フラグを一元的に保持する状態機械。
//!
//! # 経過時間の扱い
//!
//! 経過時間は常に「前回 tick 時刻からの差分」で計算する。固定量を毎 tick
//! 減算しないため、スケジューラの揺らぎや tick の取りこぼしがあっても実時間と
//! ずれない。pause / switch も直前の tick からの端数をその場で精算してから
//! 状態を変える。
//!
//! # 秒読みの期間カウント
//!
//! `periods_left` は `byoyomi_periods` から減っていく残り期間数。持ち時間切れで
//! 秒読みに入った時点では期間を消費せず、1 期間を丸ごと使い切るたびに 1 減る。
//! 0 になった時点で時間切れ。
//!
//! # 1 回の advance で解決する遷移は 1 つ
//!
//! 境界を跨いだ超過分は新しい期間から差し引く。スリープ復帰などで超過分が
//! 1 期間以上になる場合は、期間をまとめて飛ばさず即座に時間切れとする。
//!
//! 新しい期間に入ったときは、期間の長さ以下の通知閾値をその期間の開始時点で
//! 跨いだものとして通知する。

use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::command::ClockCommand;
use crate::config::{ClockConfig, ResetPolicy, SelectPolicy};
use crate::event::{crossed_thresholds, entered_thresholds, ClockEvent, EventCallback};
use crate::state::ClockState;
use crate::time_source::{MonotonicSource, TimeSource};
use crate::types::{Player, TimeControlMode};

/// 走行中に発行される tick 許可証
///
/// 発行後に pause / switch / reset などで走行状態が変わると無効になり、
/// 古い許可証での `advance_with` は何もしない。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickToken {
    epoch: u64,
}

impl TickToken {
    pub fn epoch(&self) -> u64 {
        self.epoch
    }
}

pub struct ClockEngine<S: TimeSource = MonotonicSource> {
    state: ClockState,
    source: S,
    /// 手番側の時計を最後に精算した時刻（走行中のみ Some）
    last_tick: Option<Instant>,
    thresholds: Vec<Duration>,
    tick_interval: Duration,
    reset_policy: ResetPolicy,
    select_policy: SelectPolicy,
    on_event: Option<EventCallback>,
}

impl ClockEngine<MonotonicSource> {
    pub fn new(config: &ClockConfig) -> Self {
        Self::with_source(config, MonotonicSource)
    }
}

impl<S: TimeSource> ClockEngine<S> {
    pub fn with_source(config: &ClockConfig, source: S) -> Self {
        Self {
            state: ClockState::new(config),
            source,
            last_tick: None,
            thresholds: config.alert_thresholds(),
            tick_interval: config.tick_interval(),
            reset_policy: config.reset_policy,
            select_policy: config.select_policy,
            on_event: None,
        }
    }

    /// 現在の状態のスナップショット
    #[inline]
    pub fn state(&self) -> ClockState {
        self.state
    }

    /// 外部スケジューラが advance を呼ぶべき周期
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// イベント受信コールバックを設定する（既存のものは置き換える）
    pub fn set_event_callback(&mut self, callback: EventCallback) {
        self.on_event = Some(callback);
    }

    pub fn clear_event_callback(&mut self) {
        self.on_event = None;
    }

    /// 走行中なら現在の世代の tick 許可証を返す
    pub fn tick_token(&self) -> Option<TickToken> {
        self.state.is_game_running.then_some(TickToken {
            epoch: self.state.epoch,
        })
    }

    // ------------------------------------------------------------------
    // 制御操作
    // ------------------------------------------------------------------

    /// 手番側の時計を動かす。時間切れ後・走行中は何もしない。
    pub fn start(&mut self) -> ClockState {
        if self.state.is_flag_fallen {
            debug!("start ignored: flag has fallen");
            return self.finish();
        }
        if self.state.is_game_running {
            return self.finish();
        }
        let player = *self.state.active_player.get_or_insert(Player::One);
        let now = self.source.now();
        self.state.is_game_started = true;
        self.run(player, now);
        self.emit(ClockEvent::Started { player });
        self.finish()
    }

    /// 時計を止める。直前の tick からの端数は精算する。
    pub fn pause(&mut self) -> ClockState {
        let Some(player) = self.running_active() else {
            return self.finish();
        };
        let now = self.source.now();
        if !self.settle(player, now) {
            return self.finish();
        }
        self.stop();
        self.emit(ClockEvent::Paused { player });
        self.finish()
    }

    /// 手番を相手に渡す
    ///
    /// 走行中は手番側の経過を精算し、方式ごとの補充（フィッシャー加算・
    /// 秒読みの期間リセット）を渡す側に適用してから、相手の時計を同じ時刻から
    /// 動かす。切り替えそのものには時間を課さない。
    pub fn switch_active_player(&mut self) -> ClockState {
        let Some(from) = self.state.active_player else {
            debug!("switch ignored: no active player");
            return self.finish();
        };
        if self.state.is_flag_fallen {
            debug!("switch ignored: flag has fallen");
            return self.finish();
        }
        let to = from.opponent();

        if !self.state.is_game_running {
            self.state.active_player = Some(to);
            self.emit(ClockEvent::Switched { from, to });
            return self.finish();
        }

        let now = self.source.now();
        if !self.settle(from, now) {
            return self.finish();
        }
        self.replenish(from);
        self.state.player_mut(from).is_running = false;
        self.state.active_player = Some(to);
        self.run(to, now);
        self.emit(ClockEvent::Switched { from, to });
        self.finish()
    }

    /// 手番を直接指定する
    ///
    /// 走行中の挙動は `SelectPolicy` に従う。どちらの方針でも補充は行わない。
    pub fn select_active_player(&mut self, player: Player) -> ClockState {
        if self.state.active_player == Some(player) {
            return self.finish();
        }
        if self.state.is_flag_fallen {
            debug!("select ignored: flag has fallen");
            return self.finish();
        }
        let Some(from) = self.running_active() else {
            self.state.active_player = Some(player);
            return self.finish();
        };

        let now = self.source.now();
        if !self.settle(from, now) {
            return self.finish();
        }
        match self.select_policy {
            SelectPolicy::RequireStart => {
                self.stop();
                self.state.active_player = Some(player);
                self.emit(ClockEvent::Paused { player: from });
            }
            SelectPolicy::ResumeImmediately => {
                self.state.player_mut(from).is_running = false;
                self.state.active_player = Some(player);
                self.run(player, now);
                self.emit(ClockEvent::Switched { from, to: player });
            }
        }
        self.finish()
    }

    /// 持ち時間を設定する。負の値は 0 に丸める。
    pub fn configure_main_time(
        &mut self,
        player: Player,
        minutes: i64,
        seconds: i64,
    ) -> ClockState {
        if self.reject_while_running("configure_main_time") {
            return self.finish();
        }
        let total = clamp_secs(minutes).saturating_mul(60).saturating_add(clamp_secs(seconds));
        self.state.player_mut(player).main_time = Duration::from_secs(total);
        self.rearm_if_not_started(player);
        self.finish()
    }

    /// フィッシャー加算秒 / 秒読み 1 期間の秒数を設定する
    pub fn configure_additional_time(&mut self, player: Player, seconds: i64) -> ClockState {
        if self.reject_while_running("configure_additional_time") {
            return self.finish();
        }
        self.state.player_mut(player).additional_time = Duration::from_secs(clamp_secs(seconds));
        self.rearm_if_not_started(player);
        self.finish()
    }

    /// 秒読みの期間数を設定する
    pub fn configure_byoyomi_periods(&mut self, player: Player, periods: i64) -> ClockState {
        if self.reject_while_running("configure_byoyomi_periods") {
            return self.finish();
        }
        self.state.player_mut(player).byoyomi_periods = periods.clamp(0, u32::MAX as i64) as u32;
        self.rearm_if_not_started(player);
        self.finish()
    }

    /// 持ち時間方式を切り替える。両者の対局中の値は設定値から初期化し直す。
    /// 時間切れ後は reset まで何もしない。
    pub fn set_mode(&mut self, mode: TimeControlMode) -> ClockState {
        if self.state.is_flag_fallen {
            debug!("set_mode ignored: flag has fallen");
            return self.finish();
        }
        if self.reject_while_running("set_mode") {
            return self.finish();
        }
        self.state.mode = mode;
        self.rearm_all();
        self.state.is_game_started = false;
        self.finish()
    }

    /// `from` の設定を `to` に複写し、`to` を初期化し直す
    pub fn copy_settings(&mut self, from: Player, to: Player) -> ClockState {
        if from == to || self.reject_while_running("copy_settings") {
            return self.finish();
        }
        let src = *self.state.player(from);
        let mode = self.state.mode;
        let dst = self.state.player_mut(to);
        dst.main_time = src.main_time;
        dst.additional_time = src.additional_time;
        dst.byoyomi_periods = src.byoyomi_periods;
        dst.rearm(mode);
        self.finish()
    }

    /// 時計を止め、時間切れを解除し、現在の設定値から残り時間を戻す
    pub fn reset(&mut self) -> ClockState {
        self.stop();
        self.state.is_flag_fallen = false;
        self.state.flagged_player = None;
        self.state.is_game_started = false;
        self.rearm_all();
        if self.reset_policy == ResetPolicy::Clear {
            self.state.active_player = None;
        }
        self.emit(ClockEvent::Reset);
        self.finish()
    }

    /// `ClockCommand` を対応する操作に振り分ける
    pub fn apply(&mut self, command: ClockCommand) -> ClockState {
        match command {
            ClockCommand::Start => self.start(),
            ClockCommand::Pause => self.pause(),
            ClockCommand::Switch => self.switch_active_player(),
            ClockCommand::Select { player } => self.select_active_player(player),
            ClockCommand::ConfigureMainTime {
                player,
                minutes,
                seconds,
            } => self.configure_main_time(player, minutes, seconds),
            ClockCommand::ConfigureAdditionalTime { player, seconds } => {
                self.configure_additional_time(player, seconds)
            }
            ClockCommand::ConfigureByoyomiPeriods { player, periods } => {
                self.configure_byoyomi_periods(player, periods)
            }
            ClockCommand::SetMode { mode } => self.set_mode(mode),
            ClockCommand::CopySettings { from, to } => self.copy_settings(from, to),
            ClockCommand::Reset => self.reset(),
            ClockCommand::Snapshot => self.finish(),
        }
    }

    // ------------------------------------------------------------------
    // 周期処理
    // ------------------------------------------------------------------

    /// 前回 tick からの経過時間を手番側に課す。走行中以外は何もしない。
    pub fn advance(&mut self) -> ClockState {
        if let Some(player) = self.running_active() {
            let now = self.source.now();
            self.settle(player, now);
        }
        self.finish()
    }

    /// 許可証の世代が現在と一致するときだけ `advance` する
    pub fn advance_with(&mut self, token: TickToken) -> ClockState {
        if token.epoch != self.state.epoch {
            debug!(
                "stale tick ignored (token epoch {}, current {})",
                token.epoch, self.state.epoch
            );
            return self.finish();
        }
        self.advance()
    }

    // ------------------------------------------------------------------
    // 内部処理
    // ------------------------------------------------------------------

    fn running_active(&self) -> Option<Player> {
        if self.state.is_game_running {
            self.state.active_player
        } else {
            None
        }
    }

    /// `player` の経過時間を `now` まで精算する。時間切れになったら false。
    fn settle(&mut self, player: Player, now: Instant) -> bool {
        let last = self.last_tick.replace(now).unwrap_or(now);
        let elapsed = now.saturating_duration_since(last);
        let prev = self.state.player(player).current_time;

        if let Some(next) = prev.checked_sub(elapsed).filter(|d| !d.is_zero()) {
            self.state.player_mut(player).current_time = next;
            self.notify_thresholds(player, prev, next);
            return true;
        }

        self.notify_thresholds(player, prev, Duration::ZERO);
        let overshoot = elapsed - prev;
        self.cross_phase_boundary(player, overshoot)
    }

    /// 現在のフェーズを使い切ったときの遷移。時計が動き続けるなら true。
    fn cross_phase_boundary(&mut self, player: Player, overshoot: Duration) -> bool {
        let mode = self.state.mode;
        let clock = self.state.player_mut(player);

        if mode != TimeControlMode::Byoyomi || clock.periods_left == 0 {
            self.flag_fall(player);
            return false;
        }

        let event = if clock.in_byoyomi {
            clock.periods_left -= 1;
            ClockEvent::PeriodConsumed {
                player,
                periods_left: clock.periods_left,
            }
        } else {
            clock.in_byoyomi = true;
            ClockEvent::ByoyomiEntered {
                player,
                periods_left: clock.periods_left,
            }
        };
        let periods_left = clock.periods_left;
        let period = clock.additional_time;
        self.emit(event);

        if periods_left == 0 {
            self.flag_fall(player);
            return false;
        }
        if overshoot >= period {
            warn!(
                "player {player}: tick gap overshoots a whole byoyomi period \
                 ({} ms >= {} ms), treating as flag-fall",
                overshoot.as_millis(),
                period.as_millis()
            );
            self.flag_fall(player);
            return false;
        }
        // 超過分は新しい期間から差し引く
        let next = period - overshoot;
        self.state.player_mut(player).current_time = next;
        let entered: Vec<Duration> = entered_thresholds(&self.thresholds, period, next).collect();
        self.emit_thresholds(player, entered);
        true
    }

    fn flag_fall(&mut self, player: Player) {
        self.state.player_mut(player).current_time = Duration::ZERO;
        self.stop();
        self.state.is_flag_fallen = true;
        self.state.flagged_player = Some(player);
        info!("player {player}: flag fell");
        self.emit(ClockEvent::FlagFallen { player });
    }

    /// 手番を渡す側への補充
    fn replenish(&mut self, player: Player) {
        let mode = self.state.mode;
        let clock = self.state.player_mut(player);
        match mode {
            TimeControlMode::Absolute => {}
            TimeControlMode::Fischer => {
                clock.current_time = clock.current_time.saturating_add(clock.additional_time);
            }
            TimeControlMode::Byoyomi => {
                if clock.in_byoyomi {
                    clock.current_time = clock.additional_time;
                }
            }
        }
    }

    fn run(&mut self, player: Player, now: Instant) {
        for p in Player::ALL {
            self.state.player_mut(p).is_running = p == player;
        }
        self.state.is_game_running = true;
        self.last_tick = Some(now);
        self.state.epoch += 1;
    }

    fn stop(&mut self) {
        let was_running = self.state.is_game_running;
        for p in Player::ALL {
            self.state.player_mut(p).is_running = false;
        }
        self.state.is_game_running = false;
        self.last_tick = None;
        if was_running {
            self.state.epoch += 1;
        }
    }

    fn rearm_all(&mut self) {
        let mode = self.state.mode;
        for p in Player::ALL {
            self.state.player_mut(p).rearm(mode);
        }
    }

    fn rearm_if_not_started(&mut self, player: Player) {
        if !self.state.is_game_started {
            let mode = self.state.mode;
            self.state.player_mut(player).rearm(mode);
        }
    }

    fn reject_while_running(&self, op: &str) -> bool {
        if self.state.is_game_running {
            debug!("{op} ignored while the clock is running");
            true
        } else {
            false
        }
    }

    fn notify_thresholds(&mut self, player: Player, prev: Duration, next: Duration) {
        let crossed: Vec<Duration> = crossed_thresholds(&self.thresholds, prev, next).collect();
        self.emit_thresholds(player, crossed);
    }

    fn emit_thresholds(&mut self, player: Player, thresholds: Vec<Duration>) {
        for threshold in thresholds {
            self.emit(ClockEvent::ThresholdCrossed { player, threshold });
        }
    }

    fn emit(&mut self, event: ClockEvent) {
        debug!("clock event: {event}");
        if let Some(callback) = self.on_event.as_mut() {
            callback(&event);
        }
    }

    fn finish(&self) -> ClockState {
        debug_assert_eq!(self.state.check_invariants(), Ok(()));
        self.state
    }
}

fn clamp_secs(value: i64) -> u64 {
    value.max(0) as u64
}
