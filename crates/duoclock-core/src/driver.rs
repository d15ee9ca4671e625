//! tokio 上で engine を単一 owner として駆動する actor
//!
//! engine の不変条件は並行な変更に対して安全ではないため、制御操作と
//! advance はすべて 1 つの task に直列化する。
//!
//! - 制御操作: `ClockHandle` から mpsc で送り、oneshot でスナップショットを返す
//! - tick: 走行開始（および手番交代）の時点で `Interval` を生成し、停止したら破棄する。
//!   interval は task のローカル変数なので、停止要求の後に古い tick が
//!   適用されることはない。加えて tick には `TickToken` を添えて世代を照合する。
//! - 出力: 最新スナップショットを `watch`、イベントを `broadcast` で配信する

use std::time::Duration;

use log::{debug, trace};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

use crate::command::ClockCommand;
use crate::engine::{ClockEngine, TickToken};
use crate::event::ClockEvent;
use crate::state::ClockState;
use crate::time_source::TimeSource;
use crate::types::{Player, TimeControlMode};

const COMMAND_QUEUE_CAPACITY: usize = 32;
const EVENT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("clock driver has stopped")]
    Closed,
}

enum Request {
    Command(ClockCommand, oneshot::Sender<ClockState>),
    Shutdown,
}

/// driver task への操作窓口。clone して複数箇所から使える。
#[derive(Clone)]
pub struct ClockHandle {
    requests: mpsc::Sender<Request>,
    snapshots: watch::Receiver<ClockState>,
    events: broadcast::Sender<ClockEvent>,
}

impl ClockHandle {
    /// 操作を送り、適用後のスナップショットを受け取る
    pub async fn send(&self, command: ClockCommand) -> Result<ClockState, DriverError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.requests
            .send(Request::Command(command, reply_tx))
            .await
            .map_err(|_| DriverError::Closed)?;
        reply_rx.await.map_err(|_| DriverError::Closed)
    }

    pub async fn start(&self) -> Result<ClockState, DriverError> {
        self.send(ClockCommand::Start).await
    }

    pub async fn pause(&self) -> Result<ClockState, DriverError> {
        self.send(ClockCommand::Pause).await
    }

    pub async fn switch(&self) -> Result<ClockState, DriverError> {
        self.send(ClockCommand::Switch).await
    }

    pub async fn select(&self, player: Player) -> Result<ClockState, DriverError> {
        self.send(ClockCommand::Select { player }).await
    }

    pub async fn set_mode(&self, mode: TimeControlMode) -> Result<ClockState, DriverError> {
        self.send(ClockCommand::SetMode { mode }).await
    }

    pub async fn reset(&self) -> Result<ClockState, DriverError> {
        self.send(ClockCommand::Reset).await
    }

    pub async fn snapshot(&self) -> Result<ClockState, DriverError> {
        self.send(ClockCommand::Snapshot).await
    }

    /// 最後に配信されたスナップショット（task への往復なし）
    pub fn latest(&self) -> ClockState {
        *self.snapshots.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ClockState> {
        self.snapshots.clone()
    }

    pub fn events(&self) -> broadcast::Receiver<ClockEvent> {
        self.events.subscribe()
    }

    /// task を止める。既に止まっていてもエラーにはしない。
    pub async fn shutdown(&self) {
        let _ = self.requests.send(Request::Shutdown).await;
    }
}

/// engine を所有する task を起動する。tokio ランタイム内で呼ぶこと。
///
/// 戻り値の `JoinHandle` は task 終了時の最終スナップショットを返す。
pub fn spawn<S>(mut engine: ClockEngine<S>) -> (ClockHandle, JoinHandle<ClockState>)
where
    S: TimeSource + 'static,
{
    let (request_tx, request_rx) = mpsc::channel(COMMAND_QUEUE_CAPACITY);
    let (snapshot_tx, snapshot_rx) = watch::channel(engine.state());
    let (event_tx, _) = broadcast::channel(EVENT_QUEUE_CAPACITY);

    let sink = event_tx.clone();
    engine.set_event_callback(Box::new(move |event: &ClockEvent| {
        // 受信者がいなくても engine 側は止めない
        let _ = sink.send(*event);
    }));

    let task = tokio::spawn(run(engine, request_rx, snapshot_tx));
    let handle = ClockHandle {
        requests: request_tx,
        snapshots: snapshot_rx,
        events: event_tx,
    };
    (handle, task)
}

async fn run<S: TimeSource>(
    mut engine: ClockEngine<S>,
    mut requests: mpsc::Receiver<Request>,
    snapshots: watch::Sender<ClockState>,
) -> ClockState {
    let period = engine.tick_interval();
    let mut ticker: Option<(TickToken, Interval)> = None;

    loop {
        tokio::select! {
            request = requests.recv() => {
                match request {
                    Some(Request::Command(command, reply)) => {
                        let state = engine.apply(command);
                        snapshots.send_replace(state);
                        let _ = reply.send(state);
                    }
                    Some(Request::Shutdown) | None => break,
                }
            }
            token = next_tick(&mut ticker) => {
                let state = engine.advance_with(token);
                snapshots.send_replace(state);
            }
        }
        sync_ticker(&engine, &mut ticker, period);
    }

    let state = engine.pause();
    snapshots.send_replace(state);
    debug!("clock driver stopped");
    state
}

/// engine の走行状態に合わせて interval を確保・破棄する
fn sync_ticker<S: TimeSource>(
    engine: &ClockEngine<S>,
    ticker: &mut Option<(TickToken, Interval)>,
    period: Duration,
) {
    match (engine.tick_token(), ticker.as_ref()) {
        (Some(token), Some((held, _))) if *held == token => {}
        (Some(token), _) => {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            trace!("ticker armed for epoch {}", token.epoch());
            *ticker = Some((token, interval));
        }
        (None, Some(_)) => {
            trace!("ticker released");
            *ticker = None;
        }
        (None, None) => {}
    }
}

async fn next_tick(ticker: &mut Option<(TickToken, Interval)>) -> TickToken {
    match ticker {
        Some((token, interval)) => {
            interval.tick().await;
            *token
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClockConfig, PlayerSettings};
    use crate::time_source::TokioSource;

    fn spawn_with(
        mode: TimeControlMode,
        main: u64,
        additional: u64,
        periods: u32,
    ) -> (ClockHandle, JoinHandle<ClockState>) {
        let config = ClockConfig::symmetric(
            mode,
            PlayerSettings {
                main_time_secs: main,
                additional_time_secs: additional,
                byoyomi_periods: periods,
            },
        );
        spawn(ClockEngine::with_source(&config, TokioSource))
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_flow_while_running() {
        let (handle, _task) = spawn_with(TimeControlMode::Absolute, 60, 0, 0);
        handle.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1_050)).await;
        let state = handle.snapshot().await.unwrap();
        // 最後の tick（1000ms）までが精算され、snapshot 自体は時間を進めない
        let remaining = state.player(Player::One).current_time;
        assert_eq!(remaining, Duration::from_millis(59_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_ticks_after_pause() {
        let (handle, _task) = spawn_with(TimeControlMode::Absolute, 60, 0, 0);
        handle.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        let paused = handle.pause().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(handle.snapshot().await.unwrap(), paused);
        assert_eq!(handle.latest(), paused);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flag_fall_stops_ticking_and_is_published() {
        let (handle, _task) = spawn_with(TimeControlMode::Absolute, 5, 0, 0);
        let mut snapshots = handle.subscribe();
        handle.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(5_200)).await;

        snapshots.changed().await.unwrap();
        let state = *snapshots.borrow_and_update();
        assert!(state.is_flag_fallen);
        assert!(!state.is_game_running);
        assert!(state.player(Player::One).current_time.is_zero());
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_are_broadcast() {
        let (handle, _task) = spawn_with(TimeControlMode::Absolute, 12, 0, 0);
        let mut events = handle.events();
        handle.start().await.unwrap();
        tokio::time::sleep(Duration::from_secs(13)).await;

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }
        assert_eq!(received.first(), Some(&ClockEvent::Started { player: Player::One }));
        assert!(received.contains(&ClockEvent::ThresholdCrossed {
            player: Player::One,
            threshold: Duration::from_secs(10),
        }));
        assert_eq!(received.last(), Some(&ClockEvent::FlagFallen { player: Player::One }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_rearms_ticker_for_the_new_player_only() {
        let (handle, _task) = spawn_with(TimeControlMode::Absolute, 60, 2, 0);
        let state = handle.set_mode(TimeControlMode::Fischer).await.unwrap();
        assert_eq!(state.mode, TimeControlMode::Fischer);
        handle.select(Player::Two).await.unwrap();
        handle.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1_000)).await;

        let state = handle.switch().await.unwrap();
        assert_eq!(state.active_player, Some(Player::One));
        assert_eq!(state.player(Player::Two).current_time, Duration::from_secs(61));

        tokio::time::sleep(Duration::from_millis(550)).await;
        let state = handle.snapshot().await.unwrap();
        assert_eq!(state.player(Player::One).current_time, Duration::from_millis(59_500));
        assert_eq!(state.player(Player::Two).current_time, Duration::from_secs(61));

        let state = handle.reset().await.unwrap();
        assert!(!state.is_game_running);
        for p in Player::ALL {
            assert_eq!(state.player(p).current_time, Duration::from_secs(60));
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handle.latest(), state);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_returns_settled_state() {
        let (handle, task) = spawn_with(TimeControlMode::Absolute, 60, 0, 0);
        handle.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        handle.shutdown().await;
        let final_state = task.await.unwrap();
        assert!(!final_state.is_game_running);
        assert_eq!(
            final_state.player(Player::One).current_time,
            Duration::from_millis(59_750)
        );
        assert!(matches!(handle.snapshot().await, Err(DriverError::Closed)));
    }
}
