//! 時刻源
//!
//! engine は経過時間を常に「前回 tick 時刻との差分」で計算する。
//! 時刻の取得元を差し替えられるようにしておくことで、テストや再生では
//! `ManualSource` を使って決定的に時間を進められる。

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// 単調増加する時刻を返す
pub trait TimeSource: Send {
    fn now(&self) -> Instant;
}

/// `Instant::now()` をそのまま返す既定の時刻源
#[derive(Debug, Clone, Copy, Default)]
pub struct MonotonicSource;

impl TimeSource for MonotonicSource {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// 手動で進める時刻源
///
/// clone は同じ時刻を共有する。engine に一方を渡し、テスト側がもう一方で
/// `advance` することで tick 間の経過時間を制御できる。
#[derive(Debug, Clone)]
pub struct ManualSource {
    state: Arc<Mutex<ManualState>>,
}

#[derive(Debug)]
struct ManualState {
    base: Instant,
    offset: Duration,
}

impl ManualSource {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                base: Instant::now(),
                offset: Duration::ZERO,
            })),
        }
    }

    /// 時刻を `by` だけ進める
    pub fn advance(&self, by: Duration) {
        self.state.lock().offset += by;
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }

    /// 基準時刻からの経過を `offset` に設定する。巻き戻しは無視する。
    pub fn set_offset(&self, offset: Duration) {
        let mut state = self.state.lock();
        if offset > state.offset {
            state.offset = offset;
        }
    }

    pub fn offset(&self) -> Duration {
        self.state.lock().offset
    }
}

impl Default for ManualSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for ManualSource {
    fn now(&self) -> Instant {
        let state = self.state.lock();
        state.base + state.offset
    }
}

/// tokio の時計（`tokio::time::pause` で止められる）を返す時刻源
#[cfg(feature = "tokio-driver")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSource;

#[cfg(feature = "tokio-driver")]
impl TimeSource for TokioSource {
    #[inline]
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_source_advances_shared_clock() {
        let source = ManualSource::new();
        let observer = source.clone();
        let start = observer.now();

        source.advance_ms(1500);
        assert_eq!(observer.now().duration_since(start), Duration::from_millis(1500));
        assert_eq!(observer.offset(), Duration::from_millis(1500));
    }

    #[test]
    fn test_manual_source_never_goes_backwards() {
        let source = ManualSource::new();
        source.set_offset(Duration::from_secs(5));
        source.set_offset(Duration::from_secs(2));
        assert_eq!(source.offset(), Duration::from_secs(5));
    }

    #[test]
    fn test_monotonic_source_is_non_decreasing() {
        let source = MonotonicSource;
        let mut last = source.now();
        for _ in 0..10 {
            let current = source.now();
            assert!(current >= last, "monotonic source must be non-decreasing");
            last = current;
        }
    }
}
