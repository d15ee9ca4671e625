//! スナップショットとイベントの表示
//!
//! 人間向けの 1 行表示と、`--json` 用の JSON 行の両方をここで作る。

use std::fmt::Write as _;
use std::time::Duration;

use duoclock_core::{ClockEvent, ClockState, Player, TimeControlMode};
use serde::Serialize;

/// 残り時間がこれ以下なら小数 1 桁まで表示し、警告扱いにする
pub const LOW_TIME: Duration = Duration::from_secs(10);

/// 残り時間の段階
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBand {
    Normal,
    Low,
    Out,
}

impl TimeBand {
    pub fn of(remaining: Duration) -> Self {
        if remaining.is_zero() {
            TimeBand::Out
        } else if remaining <= LOW_TIME {
            TimeBand::Low
        } else {
            TimeBand::Normal
        }
    }
}

/// 残り時間を `m:ss`（1 時間以上は `h:mm:ss`）で返す。切り捨て。
///
/// 10 秒以下は `0:09.4` のように 0.1 秒まで出す。
pub fn format_clock(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);
    let mut out = if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    };
    if TimeBand::of(remaining) == TimeBand::Low {
        let _ = write!(out, ".{}", remaining.subsec_millis() / 100);
    }
    out
}

/// 対局者 1 人分の表示（`[1]▶ 4:59 byoyomi 2/3` など）
pub fn player_cell(state: &ClockState, player: Player) -> String {
    let clock = state.player(player);
    let marker = if clock.is_running {
        '▶'
    } else if state.active_player == Some(player) {
        '*'
    } else {
        ' '
    };
    let mut cell = format!("[{player}]{marker} {}", format_clock(clock.current_time));
    match state.mode {
        TimeControlMode::Absolute => {}
        TimeControlMode::Fischer => {
            let _ = write!(cell, " +{}s", clock.additional_time.as_secs());
        }
        TimeControlMode::Byoyomi if clock.in_byoyomi => {
            let _ = write!(cell, " byoyomi {}/{}", clock.periods_left, clock.byoyomi_periods);
        }
        TimeControlMode::Byoyomi => {
            let _ = write!(
                cell,
                " ({}x{}s)",
                clock.byoyomi_periods,
                clock.additional_time.as_secs()
            );
        }
    }
    if state.flagged_player == Some(player) {
        cell.push_str(" FLAG");
    } else if clock.is_running && TimeBand::of(clock.current_time) == TimeBand::Low {
        cell.push_str(" !");
    }
    cell
}

fn phase(state: &ClockState) -> &'static str {
    if state.is_flag_fallen {
        "flag fallen"
    } else if state.is_game_running {
        "running"
    } else if state.is_game_started {
        "paused"
    } else {
        "ready"
    }
}

/// 両対局者と全体の状態を 1 行にまとめる
pub fn status_line(state: &ClockState) -> String {
    format!(
        "{} | {} | {} {}",
        player_cell(state, Player::One),
        player_cell(state, Player::Two),
        state.mode,
        phase(state)
    )
}

pub fn event_line(event: &ClockEvent) -> String {
    format!("> {event}")
}

/// `--json` 出力の 1 行
pub fn json_line<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use duoclock_core::{ClockConfig, ClockEngine, ManualSource, PlayerSettings};

    fn ms(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    fn engine(mode: TimeControlMode) -> (ClockEngine<ManualSource>, ManualSource) {
        let config = ClockConfig::symmetric(
            mode,
            PlayerSettings {
                main_time_secs: 60,
                additional_time_secs: 5,
                byoyomi_periods: 3,
            },
        );
        let source = ManualSource::new();
        (ClockEngine::with_source(&config, source.clone()), source)
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(ms(300_000)), "5:00");
        assert_eq!(format_clock(ms(59_999)), "0:59");
        assert_eq!(format_clock(ms(10_000)), "0:10.0");
        assert_eq!(format_clock(ms(9_470)), "0:09.4");
        assert_eq!(format_clock(Duration::ZERO), "0:00");
        assert_eq!(format_clock(ms(3_723_000)), "1:02:03");
    }

    #[test]
    fn test_time_band() {
        assert_eq!(TimeBand::of(ms(10_001)), TimeBand::Normal);
        assert_eq!(TimeBand::of(ms(10_000)), TimeBand::Low);
        assert_eq!(TimeBand::of(ms(1)), TimeBand::Low);
        assert_eq!(TimeBand::of(Duration::ZERO), TimeBand::Out);
    }

    #[test]
    fn test_status_line_before_start() {
        let (engine, _) = engine(TimeControlMode::Byoyomi);
        assert_eq!(
            status_line(&engine.state()),
            "[1]* 1:00 (3x5s) | [2]  1:00 (3x5s) | byoyomi ready"
        );
    }

    #[test]
    fn test_status_line_in_byoyomi() {
        let (mut engine, source) = engine(TimeControlMode::Byoyomi);
        engine.start();
        source.advance_ms(61_000);
        let state = engine.advance();
        assert_eq!(
            status_line(&state),
            "[1]▶ 0:04.0 byoyomi 3/3 ! | [2]  1:00 (3x5s) | byoyomi running"
        );
    }

    #[test]
    fn test_status_line_fischer_paused() {
        let (mut engine, source) = engine(TimeControlMode::Fischer);
        engine.start();
        source.advance_ms(2_000);
        engine.switch_active_player();
        let state = engine.pause();
        assert_eq!(
            status_line(&state),
            "[1]  1:03 +5s | [2]* 1:00 +5s | fischer paused"
        );
    }

    #[test]
    fn test_status_line_after_flag() {
        let (mut engine, source) = engine(TimeControlMode::Absolute);
        engine.start();
        source.advance_ms(60_000);
        let state = engine.advance();
        assert_eq!(
            status_line(&state),
            "[1]* 0:00 FLAG | [2]  1:00 | absolute flag fallen"
        );
    }

    #[test]
    fn test_event_and_json_lines() {
        let event = ClockEvent::FlagFallen { player: Player::Two };
        assert_eq!(event_line(&event), "> player 2 flag fell");
        assert_eq!(
            json_line(&event).unwrap(),
            r#"{"kind":"flag_fallen","player":"2"}"#
        );
    }
}
