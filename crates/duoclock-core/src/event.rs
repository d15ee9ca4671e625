//! engine が発行するイベント
//!
//! 音・振動などの副作用はここでは扱わない。engine は閾値を跨いだ瞬間などに
//! 一度だけイベントを通知し、再生方法は受け取り側が決める。

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::state::serialize_millis;
use crate::types::Player;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClockEvent {
    Started {
        player: Player,
    },
    Paused {
        player: Player,
    },
    Switched {
        from: Player,
        to: Player,
    },
    /// 残り時間が `threshold` 以下になった（跨いだ瞬間に 1 回）
    ThresholdCrossed {
        player: Player,
        #[serde(rename = "threshold_ms", serialize_with = "serialize_millis")]
        threshold: Duration,
    },
    /// 持ち時間を使い切り秒読みに入った
    ByoyomiEntered {
        player: Player,
        periods_left: u32,
    },
    /// 秒読みの 1 期間を使い切った
    PeriodConsumed {
        player: Player,
        periods_left: u32,
    },
    FlagFallen {
        player: Player,
    },
    Reset,
}

impl fmt::Display for ClockEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockEvent::Started { player } => write!(f, "player {player} started"),
            ClockEvent::Paused { player } => write!(f, "player {player} paused"),
            ClockEvent::Switched { from, to } => write!(f, "switched {from} -> {to}"),
            ClockEvent::ThresholdCrossed { player, threshold } => {
                write!(f, "player {player} below {}s", threshold.as_secs())
            }
            ClockEvent::ByoyomiEntered {
                player,
                periods_left,
            } => write!(f, "player {player} entered byoyomi ({periods_left} periods)"),
            ClockEvent::PeriodConsumed {
                player,
                periods_left,
            } => write!(f, "player {player} used a period ({periods_left} left)"),
            ClockEvent::FlagFallen { player } => write!(f, "player {player} flag fell"),
            ClockEvent::Reset => f.write_str("reset"),
        }
    }
}

/// イベント受信コールバック
pub type EventCallback = Box<dyn FnMut(&ClockEvent) + Send>;

/// `prev` から `next` へ残り時間が減ったときに跨いだ閾値を返す
///
/// `thresholds` は降順であること。`prev > t >= next` を満たす `t` が対象。
pub(crate) fn crossed_thresholds(
    thresholds: &[Duration],
    prev: Duration,
    next: Duration,
) -> impl Iterator<Item = Duration> + '_ {
    thresholds.iter().copied().filter(move |t| prev > *t && *t >= next)
}

/// 新しい秒読み期間を `start` から始めて `next` まで減ったときに通知する閾値
///
/// 期間の長さちょうどの閾値も期間開始時点で跨いだものとみなす（`start >= t >= next`）。
pub(crate) fn entered_thresholds(
    thresholds: &[Duration],
    start: Duration,
    next: Duration,
) -> impl Iterator<Item = Duration> + '_ {
    thresholds.iter().copied().filter(move |t| start >= *t && *t >= next)
}
