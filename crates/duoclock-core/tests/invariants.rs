//! 任意の操作列に対する不変条件の検査（proptest）

use std::time::Duration;

use duoclock_core::{
    ClockCommand, ClockConfig, ClockEngine, ManualSource, Player, PlayerSettings, TimeControlMode,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Command(ClockCommand),
    Wait(u64),
    Advance,
}

fn player() -> impl Strategy<Value = Player> {
    prop_oneof![Just(Player::One), Just(Player::Two)]
}

fn mode() -> impl Strategy<Value = TimeControlMode> {
    prop_oneof![
        Just(TimeControlMode::Absolute),
        Just(TimeControlMode::Fischer),
        Just(TimeControlMode::Byoyomi),
    ]
}

fn command() -> impl Strategy<Value = ClockCommand> {
    prop_oneof![
        Just(ClockCommand::Start),
        Just(ClockCommand::Pause),
        Just(ClockCommand::Switch),
        Just(ClockCommand::Reset),
        player().prop_map(|player| ClockCommand::Select { player }),
        (player(), -2i64..3, -5i64..20).prop_map(|(player, minutes, seconds)| {
            ClockCommand::ConfigureMainTime {
                player,
                minutes,
                seconds,
            }
        }),
        (player(), -2i64..8).prop_map(|(player, seconds)| {
            ClockCommand::ConfigureAdditionalTime { player, seconds }
        }),
        (player(), -1i64..4).prop_map(|(player, periods)| {
            ClockCommand::ConfigureByoyomiPeriods { player, periods }
        }),
        mode().prop_map(|mode| ClockCommand::SetMode { mode }),
        (player(), player()).prop_map(|(from, to)| ClockCommand::CopySettings { from, to }),
    ]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => command().prop_map(Op::Command),
        3 => (0u64..4_000).prop_map(Op::Wait),
        4 => Just(Op::Advance),
    ]
}

fn small_engine(mode: TimeControlMode) -> (ClockEngine<ManualSource>, ManualSource) {
    let config = ClockConfig::symmetric(
        mode,
        PlayerSettings {
            main_time_secs: 3,
            additional_time_secs: 2,
            byoyomi_periods: 2,
        },
    );
    let source = ManualSource::new();
    (ClockEngine::with_source(&config, source.clone()), source)
}

proptest! {
    #[test]
    fn test_invariants_hold_after_every_call(
        initial in mode(),
        ops in prop::collection::vec(op(), 1..80),
    ) {
        let (mut engine, source) = small_engine(initial);
        for op in ops {
            let before = engine.state();
            let after = match &op {
                Op::Command(command) => engine.apply(*command),
                Op::Wait(ms) => {
                    source.advance_ms(*ms);
                    engine.state()
                }
                Op::Advance => engine.advance(),
            };
            prop_assert_eq!(after.check_invariants(), Ok(()));

            // 時間切れは reset 以外では解除されない
            if before.is_flag_fallen && !matches!(op, Op::Command(ClockCommand::Reset)) {
                prop_assert!(after.is_flag_fallen);
            }
            // 設定値は停止中にしか変わらない
            if before.is_game_running {
                for p in Player::ALL {
                    prop_assert_eq!(before.player(p).settings(), after.player(p).settings());
                }
                prop_assert_eq!(before.mode, after.mode);
            }
        }
    }

    #[test]
    fn test_countdown_matches_elapsed_wall_clock(
        deltas in prop::collection::vec(0u64..500, 1..100),
    ) {
        let (mut engine, source) = small_engine(TimeControlMode::Absolute);
        engine.configure_main_time(Player::One, 1, 0);
        engine.start();
        let mut expected = Duration::from_secs(60);
        for ms in deltas {
            source.advance_ms(ms);
            let state = engine.advance();
            expected -= Duration::from_millis(ms);
            prop_assert_eq!(state.player(Player::One).current_time, expected);
        }
    }

    #[test]
    fn test_fischer_switch_adds_exact_increment(think_ms in 0u64..50_000, increment in 0i64..60) {
        let (mut engine, source) = small_engine(TimeControlMode::Fischer);
        engine.configure_main_time(Player::One, 1, 0);
        engine.configure_additional_time(Player::One, increment);
        engine.start();
        source.advance_ms(think_ms);
        let state = engine.switch_active_player();
        let p1 = state.player(Player::One);
        let expected =
            Duration::from_millis(60_000 - think_ms) + Duration::from_secs(increment as u64);
        prop_assert_eq!(p1.current_time, expected);
        prop_assert_eq!(state.active_player, Some(Player::Two));
    }
}
