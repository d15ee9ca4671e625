//! `duoclock` バイナリ
//!
//! 設定を組み立てて driver を起動し、標準入力の対話ループを回す。
//! 入力終了・`quit`・Ctrl-C のいずれでも時計を止めて最終状態を出力する。

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use duoclock_cli::render;
use duoclock_cli::{logging, run_session, Cli, SessionOptions};
use duoclock_core::{driver, ClockEngine, TokioSource};
use tokio::io::BufReader;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init()?;

    let config = cli.clock_config().context("invalid clock configuration")?;
    info!(
        "mode={} p1={:?} p2={:?} tick={}ms",
        config.mode, config.player1, config.player2, config.tick_interval_ms
    );

    let engine = ClockEngine::with_source(&config, TokioSource);
    let (handle, task) = driver::spawn(engine);
    let options = SessionOptions {
        json: cli.json,
        refresh: cli.refresh_interval(),
    };

    let mut stdout = std::io::stdout();
    let stdin = BufReader::new(tokio::io::stdin());
    tokio::select! {
        result = run_session(&handle, stdin, &mut stdout, &options) => result?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            info!("interrupted");
        }
    }

    handle.shutdown().await;
    let final_state = task.await.context("clock driver task failed")?;
    let line = if cli.json {
        render::json_line(&final_state)?
    } else {
        render::status_line(&final_state)
    };
    writeln!(stdout, "{line}").context("failed to write output")?;
    Ok(())
}
