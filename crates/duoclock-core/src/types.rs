//! 対局者（Player）と持ち時間方式（TimeControlMode）

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 対局者（1 / 2）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Player {
    #[serde(rename = "1")]
    One = 0,
    #[serde(rename = "2")]
    Two = 1,
}

impl Player {
    /// 対局者の数
    pub const NUM: usize = 2;

    /// 全対局者（インデックス順）
    pub const ALL: [Player; Player::NUM] = [Player::One, Player::Two];

    /// 相手を返す
    #[inline]
    pub const fn opponent(self) -> Player {
        match self {
            Player::One => Player::Two,
            Player::Two => Player::One,
        }
    }

    /// インデックスとして使用（配列アクセス用）
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// 表示用の番号（1 / 2）
    #[inline]
    pub const fn number(self) -> u8 {
        self as u8 + 1
    }

    /// 番号（1 / 2）から変換する。範囲外は `None`。
    pub const fn from_number(n: u8) -> Option<Player> {
        match n {
            1 => Some(Player::One),
            2 => Some(Player::Two),
            _ => None,
        }
    }
}

impl std::ops::Not for Player {
    type Output = Player;

    #[inline]
    fn not(self) -> Player {
        self.opponent()
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// `Player` / `TimeControlMode` の文字列解析エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseKindError {
    #[error("unknown player `{0}` (expected 1 or 2)")]
    Player(String),
    #[error("unknown time control mode `{0}` (expected absolute, fischer or byoyomi)")]
    Mode(String),
}

impl FromStr for Player {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u8>()
            .ok()
            .and_then(Player::from_number)
            .ok_or_else(|| ParseKindError::Player(s.to_string()))
    }
}

/// 持ち時間方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeControlMode {
    /// 切れ負け（持ち時間のみ）
    Absolute,
    /// フィッシャー（手番終了ごとに加算）
    Fischer,
    /// 秒読み（持ち時間切れ後に一定時間の期間を複数回）
    #[default]
    Byoyomi,
}

impl TimeControlMode {
    pub const ALL: [TimeControlMode; 3] = [
        TimeControlMode::Absolute,
        TimeControlMode::Fischer,
        TimeControlMode::Byoyomi,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            TimeControlMode::Absolute => "absolute",
            TimeControlMode::Fischer => "fischer",
            TimeControlMode::Byoyomi => "byoyomi",
        }
    }
}

impl fmt::Display for TimeControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeControlMode {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "absolute" | "sudden-death" => Ok(TimeControlMode::Absolute),
            "fischer" | "increment" => Ok(TimeControlMode::Fischer),
            "byoyomi" => Ok(TimeControlMode::Byoyomi),
            _ => Err(ParseKindError::Mode(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_opponent() {
        assert_eq!(Player::One.opponent(), Player::Two);
        assert_eq!(Player::Two.opponent(), Player::One);
        assert_eq!(!Player::One, Player::Two);
    }

    #[test]
    fn test_player_index_and_number() {
        assert_eq!(Player::One.index(), 0);
        assert_eq!(Player::Two.index(), 1);
        assert_eq!(Player::One.number(), 1);
        assert_eq!(Player::from_number(2), Some(Player::Two));
        assert_eq!(Player::from_number(3), None);
    }

    #[test]
    fn test_player_from_str() {
        assert_eq!("1".parse::<Player>(), Ok(Player::One));
        assert_eq!(" 2 ".parse::<Player>(), Ok(Player::Two));
        assert!("0".parse::<Player>().is_err());
        assert!("black".parse::<Player>().is_err());
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("Fischer".parse::<TimeControlMode>(), Ok(TimeControlMode::Fischer));
        assert_eq!("sudden-death".parse::<TimeControlMode>(), Ok(TimeControlMode::Absolute));
        assert_eq!("byoyomi".parse::<TimeControlMode>(), Ok(TimeControlMode::Byoyomi));
        assert!("hourglass".parse::<TimeControlMode>().is_err());
    }

    #[test]
    fn test_mode_display_round_trips_through_from_str() {
        for mode in TimeControlMode::ALL {
            assert_eq!(mode.to_string().parse::<TimeControlMode>(), Ok(mode));
        }
    }
}
