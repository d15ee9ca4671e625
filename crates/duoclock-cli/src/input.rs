//! 標準入力の 1 行コマンドの解析
//!
//! `{` で始まる行は `ClockCommand` の JSON として読む（`{"op":"select","player":"2"}`）。

use duoclock_core::{ClockCommand, ParseKindError, Player, TimeControlMode};
use thiserror::Error;

/// 1 行分の入力
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Clock(ClockCommand),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error)]
pub enum ParseCommandError {
    #[error("unknown command `{0}` (type `help` for the list)")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid number `{0}`")]
    InvalidNumber(String),
    #[error(transparent)]
    Kind(#[from] ParseKindError),
    #[error("invalid JSON command: {0}")]
    Json(#[from] serde_json::Error),
}

pub const HELP: &str = "\
commands:
  start                   start or resume the active player's clock
  pause                   stop the clock
  switch | <enter>        end the active player's turn
  select <1|2>            choose the active player
  main <p> <min> [sec]    set main time (while stopped)
  add <p> <sec>           set increment / byoyomi period length
  periods <p> <n>         set number of byoyomi periods
  mode <m>                absolute | fischer | byoyomi
  copy <from> <to>        copy one player's settings to the other
  reset                   restore configured times
  status                  print the current state
  help                    show this list
  quit                    stop and exit";

/// 1 行を解析する。前後の空白は無視し、空行は手番交代とする。
pub fn parse_line(line: &str) -> Result<Input, ParseCommandError> {
    let line = line.trim();
    if line.starts_with('{') {
        return Ok(Input::Clock(serde_json::from_str(line)?));
    }

    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(Input::Clock(ClockCommand::Switch));
    };
    let args: Vec<&str> = words.collect();

    let input = match head.to_ascii_lowercase().as_str() {
        "start" | "resume" => Input::Clock(ClockCommand::Start),
        "pause" | "stop" => Input::Clock(ClockCommand::Pause),
        "switch" | "s" => Input::Clock(ClockCommand::Switch),
        "reset" => Input::Clock(ClockCommand::Reset),
        "status" => Input::Status,
        "help" | "?" => Input::Help,
        "quit" | "exit" | "q" => Input::Quit,
        "select" => match args.as_slice() {
            [player] => Input::Clock(ClockCommand::Select {
                player: player.parse()?,
            }),
            _ => return Err(ParseCommandError::Usage("select <1|2>")),
        },
        "main" => match args.as_slice() {
            [player, minutes] => Input::Clock(ClockCommand::ConfigureMainTime {
                player: player.parse()?,
                minutes: number(minutes)?,
                seconds: 0,
            }),
            [player, minutes, seconds] => Input::Clock(ClockCommand::ConfigureMainTime {
                player: player.parse()?,
                minutes: number(minutes)?,
                seconds: number(seconds)?,
            }),
            _ => return Err(ParseCommandError::Usage("main <p> <min> [sec]")),
        },
        "add" => match args.as_slice() {
            [player, seconds] => Input::Clock(ClockCommand::ConfigureAdditionalTime {
                player: player.parse()?,
                seconds: number(seconds)?,
            }),
            _ => return Err(ParseCommandError::Usage("add <p> <sec>")),
        },
        "periods" => match args.as_slice() {
            [player, periods] => Input::Clock(ClockCommand::ConfigureByoyomiPeriods {
                player: player.parse()?,
                periods: number(periods)?,
            }),
            _ => return Err(ParseCommandError::Usage("periods <p> <n>")),
        },
        "mode" => match args.as_slice() {
            [mode] => Input::Clock(ClockCommand::SetMode {
                mode: mode.parse::<TimeControlMode>()?,
            }),
            _ => return Err(ParseCommandError::Usage("mode <absolute|fischer|byoyomi>")),
        },
        "copy" => match args.as_slice() {
            [from, to] => Input::Clock(ClockCommand::CopySettings {
                from: from.parse::<Player>()?,
                to: to.parse::<Player>()?,
            }),
            _ => return Err(ParseCommandError::Usage("copy <from> <to>")),
        },
        _ => return Err(ParseCommandError::Unknown(head.to_string())),
    };
    Ok(input)
}

fn number(s: &str) -> Result<i64, ParseCommandError> {
    s.parse()
        .map_err(|_| ParseCommandError::InvalidNumber(s.to_string()))
}
