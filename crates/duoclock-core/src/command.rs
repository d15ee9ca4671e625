//! 制御操作を値として表したもの
//!
//! driver のチャネル越しや CLI から engine を操作するときに使う。

use serde::Deserialize;

use crate::types::{Player, TimeControlMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ClockCommand {
    Start,
    Pause,
    Switch,
    Select {
        player: Player,
    },
    ConfigureMainTime {
        player: Player,
        minutes: i64,
        seconds: i64,
    },
    ConfigureAdditionalTime {
        player: Player,
        seconds: i64,
    },
    ConfigureByoyomiPeriods {
        player: Player,
        periods: i64,
    },
    SetMode {
        mode: TimeControlMode,
    },
    CopySettings {
        from: Player,
        to: Player,
    },
    Reset,
    /// 状態を変えずにスナップショットだけ返す
    Snapshot,
}
