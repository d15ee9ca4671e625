//! ログ出力の初期化
//!
//! 時計の表示は stdout に出すため、ログは stderr に書く。core 側の `log` 出力は
//! `tracing-log` で subscriber に流す。レベルは `RUST_LOG` で指定する（既定は warn）。

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn";

pub fn init() -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")?;
    tracing_log::LogTracer::init().context("failed to bridge log records into tracing")?;
    Ok(())
}
