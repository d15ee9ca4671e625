//! 対話ループ
//!
//! 入力行を driver への操作に変換し、返ってきたスナップショットと
//! broadcast されたイベントを出力に書く。走行中は `refresh` 間隔で状態行も出す。

use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use duoclock_core::{ClockEvent, ClockHandle, ClockState};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::input::{parse_line, Input, HELP};
use crate::render;

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub json: bool,
    /// 走行中に状態行を出す間隔（`None` なら出さない）
    pub refresh: Option<Duration>,
}

/// 入力が尽きるか `quit` を受けるまで対話を続ける
///
/// driver 自体は止めない。終了処理は呼び出し側で `shutdown` する。
pub async fn run_session<R, W>(
    handle: &ClockHandle,
    input: R,
    out: &mut W,
    options: &SessionOptions,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut printer = Printer { out, json: options.json };
    let mut lines = input.lines();
    let mut events = handle.events();
    let mut refresh = options.refresh.map(|period| {
        let mut refresh = interval(period);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);
        refresh
    });

    printer.state(&handle.latest())?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read command input")? else {
                    debug!("input closed");
                    break;
                };
                match parse_line(&line) {
                    Ok(Input::Quit) => break,
                    Ok(Input::Help) => printer.text(HELP)?,
                    Ok(Input::Status) => {
                        let state = handle.snapshot().await?;
                        printer.state(&state)?;
                    }
                    Ok(Input::Clock(command)) => {
                        let state = handle.send(command).await?;
                        // 操作が発行したイベントを状態行より先に出す
                        drain_events(&mut events, &mut printer)?;
                        printer.state(&state)?;
                    }
                    Err(e) => {
                        debug!("rejected input {line:?}: {e}");
                        printer.text(&format!("error: {e}"))?;
                    }
                }
            }
            event = events.recv() => match event {
                Ok(event) => {
                    printer.event(&event)?;
                    if matches!(event, ClockEvent::FlagFallen { .. }) {
                        let state = handle.snapshot().await?;
                        printer.state(&state)?;
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!("dropped {skipped} clock events"),
                Err(RecvError::Closed) => break,
            },
            _ = next_refresh(&mut refresh), if handle.latest().is_game_running => {
                printer.state(&handle.latest())?;
            }
        }
    }
    Ok(())
}

fn drain_events<W: Write>(
    events: &mut broadcast::Receiver<ClockEvent>,
    printer: &mut Printer<'_, W>,
) -> Result<()> {
    loop {
        match events.try_recv() {
            Ok(event) => printer.event(&event)?,
            Err(TryRecvError::Lagged(skipped)) => warn!("dropped {skipped} clock events"),
            Err(TryRecvError::Empty | TryRecvError::Closed) => return Ok(()),
        }
    }
}

async fn next_refresh(refresh: &mut Option<Interval>) {
    match refresh {
        Some(refresh) => {
            refresh.tick().await;
        }
        None => std::future::pending().await,
    }
}

struct Printer<'a, W: Write> {
    out: &'a mut W,
    json: bool,
}

impl<W: Write> Printer<'_, W> {
    fn state(&mut self, state: &ClockState) -> Result<()> {
        let line = if self.json {
            render::json_line(state)?
        } else {
            render::status_line(state)
        };
        self.line(&line)
    }

    fn event(&mut self, event: &ClockEvent) -> Result<()> {
        let line = if self.json {
            render::json_line(event)?
        } else {
            render::event_line(event)
        };
        self.line(&line)
    }

    fn text(&mut self, text: &str) -> Result<()> {
        if self.json {
            // JSON 出力を壊さないよう説明文は stderr に回す
            eprintln!("{text}");
            return Ok(());
        }
        self.line(text)
    }

    fn line(&mut self, line: &str) -> Result<()> {
        writeln!(self.out, "{line}").context("failed to write output")?;
        self.out.flush().context("failed to flush output")
    }
}
