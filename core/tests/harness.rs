//! The harness thread, driven through its channels.

use dyson_core::{
    command::Action,
    config::{GameData, NewGameConfig},
    harness::{HarnessConfig, HarnessHandle, HarnessRequest, HarnessResponse},
};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

fn spawn(run_id: &str) -> HarnessHandle {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut config = HarnessConfig::new(run_id, GameData::default_test());
    config.tick_interval = Duration::from_millis(1);
    config.state_update_every = 1;
    HarnessHandle::spawn(config).unwrap()
}

/// Next response that is not a periodic state update.
fn next_reply(handle: &HarnessHandle) -> HarnessResponse {
    loop {
        match handle.recv_timeout(WAIT) {
            Some(HarnessResponse::StateUpdate { .. }) => continue,
            Some(other) => return other,
            None => panic!("harness went quiet"),
        }
    }
}

fn start(handle: &HarnessHandle) {
    assert!(handle.send(HarnessRequest::Init { data_dir: None }));
    assert!(matches!(next_reply(handle), HarnessResponse::InitComplete { success: true }));
    assert!(handle.send(HarnessRequest::Start { config: NewGameConfig::default(), prior_state: None }));
    assert!(matches!(next_reply(handle), HarnessResponse::StartComplete { .. }));
}

#[test]
fn start_before_init_is_an_error() {
    let handle = spawn("harness-no-init");
    handle.send(HarnessRequest::Start { config: NewGameConfig::default(), prior_state: None });
    assert!(matches!(next_reply(&handle), HarnessResponse::Error { .. }));
    handle.shutdown();
}

#[test]
fn failed_reinit_forgets_earlier_data() {
    let handle = spawn("harness-reinit");
    handle.send(HarnessRequest::Init { data_dir: None });
    assert!(matches!(next_reply(&handle), HarnessResponse::InitComplete { success: true }));

    handle.send(HarnessRequest::Init { data_dir: Some("/nonexistent/dyson-data".into()) });
    assert!(matches!(next_reply(&handle), HarnessResponse::Error { .. }));

    handle.send(HarnessRequest::Start { config: NewGameConfig::default(), prior_state: None });
    assert!(matches!(next_reply(&handle), HarnessResponse::Error { .. }));
    handle.shutdown();
}

#[test]
fn running_harness_streams_state_updates() {
    let handle = spawn("harness-updates");
    start(&handle);

    let mut last_tick = 0;
    let mut updates = 0;
    while updates < 5 {
        match handle.recv_timeout(WAIT) {
            Some(HarnessResponse::StateUpdate { state, .. }) => {
                assert!(state.clock.current_tick >= last_tick);
                last_tick = state.clock.current_tick;
                updates += 1;
            }
            Some(other) => panic!("unexpected {other:?}"),
            None => panic!("no state updates"),
        }
    }
    assert!(last_tick > 0);
    handle.shutdown();
}

#[test]
fn actions_are_answered_with_their_id() {
    let handle = spawn("harness-actions");
    start(&handle);

    handle.send(HarnessRequest::Action {
        id: 7,
        action: Action::PurchaseProbe { zone: "earth".into(), probe_type: None, count: 2 },
    });
    match next_reply(&handle) {
        HarnessResponse::ActionComplete { id, success, state, .. } => {
            assert_eq!(id, 7);
            assert!(success);
            assert_eq!(state.probe_count("earth"), 3);
        }
        other => panic!("unexpected {other:?}"),
    }

    handle.send(HarnessRequest::Action {
        id: 8,
        action: Action::PurchaseProbe { zone: "earth".into(), probe_type: None, count: 1_000 },
    });
    assert!(matches!(next_reply(&handle), HarnessResponse::ActionError { id: 8, .. }));
    handle.shutdown();
}

#[test]
fn stop_sends_a_final_state_then_stop_complete() {
    let handle = spawn("harness-stop");
    start(&handle);
    handle.send(HarnessRequest::SetTimeSpeed { multiplier: 10.0 });
    handle.send(HarnessRequest::Stop);

    let mut saw_state = false;
    loop {
        match handle.recv_timeout(WAIT) {
            Some(HarnessResponse::StateUpdate { .. }) => saw_state = true,
            Some(HarnessResponse::StopComplete) => break,
            Some(other) => panic!("unexpected {other:?}"),
            None => panic!("no StopComplete"),
        }
    }
    assert!(saw_state);

    // Stopped: the clock no longer moves between requests.
    handle.send(HarnessRequest::GetState);
    let first = match handle.recv_timeout(WAIT) {
        Some(HarnessResponse::StateUpdate { state, .. }) => state,
        other => panic!("unexpected {other:?}"),
    };
    std::thread::sleep(Duration::from_millis(20));
    handle.send(HarnessRequest::GetState);
    let second = match handle.recv_timeout(WAIT) {
        Some(HarnessResponse::StateUpdate { state, .. }) => state,
        other => panic!("unexpected {other:?}"),
    };
    assert_eq!(first.clock.current_tick, second.clock.current_tick);
    assert_eq!(second.clock.time_speed, 10.0);
    handle.shutdown();
}

#[test]
fn get_state_before_start_is_an_error() {
    let handle = spawn("harness-no-state");
    handle.send(HarnessRequest::GetState);
    assert!(matches!(next_reply(&handle), HarnessResponse::Error { .. }));
    handle.shutdown();
}
