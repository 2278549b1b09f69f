//! Harness thread: owns a `SimEngine` and drives it on a fixed cadence.
//!
//! The engine is created inside the thread. Requests arrive on one
//! crossbeam channel and responses leave on another; nothing is shared.
//! Every state handed out is an owned copy.
//!
//! Cadence: while started, one tick every `tick_interval` (60 Hz by
//! default) with Δt = speed / 60 days, and a `StateUpdate` every
//! `state_update_every` ticks. Stop finishes the current tick, sends a
//! final `StateUpdate`, then `StopComplete`. Shutdown, or every request
//! sender going away, ends the thread.

use crate::{
    command::{Action, ActionResult},
    config::{GameData, NewGameConfig},
    engine::{SimEngine, TICK_HZ},
    error::{SimError, SimResult},
    state::WorldState,
    types::{ActionId, RunId},
};
use crossbeam_channel::{never, select, tick, unbounded, Receiver, RecvTimeoutError, Sender};
use serde::{Deserialize, Serialize};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Requests into the harness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HarnessRequest {
    /// Load game data. Without a directory the harness uses the data it
    /// was spawned with. A failed load leaves the harness uninitialized.
    #[serde(rename_all = "camelCase")]
    Init {
        #[serde(default)]
        data_dir: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Start {
        #[serde(default)]
        config: NewGameConfig,
        #[serde(default)]
        prior_state: Option<Box<WorldState>>,
    },
    Stop,
    SetTimeSpeed {
        multiplier: f64,
    },
    Action {
        id: ActionId,
        action: Action,
    },
    GetState,
    Shutdown,
}

/// Responses out of the harness.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HarnessResponse {
    InitComplete {
        success: bool,
    },
    Error {
        message: String,
    },
    StartComplete {
        state: Box<WorldState>,
    },
    #[serde(rename_all = "camelCase")]
    StateUpdate {
        state: Box<WorldState>,
        tick_duration_ms: f64,
    },
    StopComplete,
    ActionComplete {
        id: ActionId,
        success: bool,
        result: ActionResult,
        state: Box<WorldState>,
    },
    ActionError {
        id: ActionId,
        message: String,
    },
}

#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub run_id: RunId,
    pub data: GameData,
    pub tick_interval: Duration,
    pub state_update_every: u64,
}

impl HarnessConfig {
    pub fn new(run_id: impl Into<RunId>, data: GameData) -> Self {
        Self {
            run_id: run_id.into(),
            data,
            tick_interval: Duration::from_secs_f64(1.0 / TICK_HZ),
            state_update_every: 6,
        }
    }
}

/// The caller's end of a running harness.
pub struct HarnessHandle {
    requests: Sender<HarnessRequest>,
    responses: Receiver<HarnessResponse>,
    thread: Option<JoinHandle<()>>,
}

impl HarnessHandle {
    /// Spawn the harness thread.
    pub fn spawn(config: HarnessConfig) -> SimResult<Self> {
        let (req_tx, req_rx) = unbounded::<HarnessRequest>();
        let (resp_tx, resp_rx) = unbounded::<HarnessResponse>();
        let thread = std::thread::Builder::new()
            .name("dyson-harness".into())
            .spawn(move || Harness::new(config, resp_tx).run(req_rx))
            .map_err(|e| SimError::Other(e.into()))?;
        Ok(Self {
            requests: req_tx,
            responses: resp_rx,
            thread: Some(thread),
        })
    }

    /// Returns false once the harness has gone away.
    pub fn send(&self, request: HarnessRequest) -> bool {
        self.requests.send(request).is_ok()
    }

    pub fn sender(&self) -> Sender<HarnessRequest> {
        self.requests.clone()
    }

    pub fn responses(&self) -> &Receiver<HarnessResponse> {
        &self.responses
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<HarnessResponse> {
        match self.responses.recv_timeout(timeout) {
            Ok(resp) => Some(resp),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Send `Shutdown` and wait for the thread to exit.
    pub fn shutdown(mut self) {
        let _ = self.requests.send(HarnessRequest::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("harness: thread panicked");
            }
        }
    }
}

struct Harness {
    config: HarnessConfig,
    responses: Sender<HarnessResponse>,
    data: Option<GameData>,
    engine: Option<SimEngine>,
    running: bool,
    ticks_since_update: u64,
    last_tick_ms: f64,
}

enum Flow {
    Continue,
    Exit,
}

impl Harness {
    fn new(config: HarnessConfig, responses: Sender<HarnessResponse>) -> Self {
        Self {
            config,
            responses,
            data: None,
            engine: None,
            running: false,
            ticks_since_update: 0,
            last_tick_ms: 0.0,
        }
    }

    fn run(mut self, requests: Receiver<HarnessRequest>) {
        let mut ticker = self.ticker();
        loop {
            let was_running = self.running;
            select! {
                recv(requests) -> msg => {
                    let Ok(request) = msg else {
                        log::info!("harness: request channel closed");
                        return;
                    };
                    if let Flow::Exit = self.handle(request) {
                        return;
                    }
                }
                recv(ticker) -> _ => {
                    if self.running {
                        self.on_tick();
                    }
                }
            }
            // A failed tick stops the run too, not only Start/Stop.
            if self.running != was_running {
                ticker = self.ticker();
            }
        }
    }

    fn ticker(&self) -> Receiver<Instant> {
        if self.running { tick(self.config.tick_interval) } else { never() }
    }

    fn send(&self, response: HarnessResponse) {
        if let Err(e) = self.responses.send(response) {
            log::warn!("harness: response dropped: {e}");
        }
    }

    fn send_state(&self) {
        if let Some(engine) = &self.engine {
            self.send(HarnessResponse::StateUpdate {
                state: Box::new(engine.snapshot()),
                tick_duration_ms: self.last_tick_ms,
            });
        }
    }

    fn handle(&mut self, request: HarnessRequest) -> Flow {
        match request {
            HarnessRequest::Init { data_dir } => {
                let loaded = match data_dir {
                    Some(dir) => GameData::load(&dir).map_err(|e| format!("{e:#}")),
                    None => Ok(self.config.data.clone()),
                };
                match loaded {
                    Ok(data) => {
                        self.data = Some(data);
                        self.send(HarnessResponse::InitComplete { success: true });
                    }
                    Err(message) => {
                        log::warn!("harness: init failed: {message}");
                        self.data = None;
                        self.send(HarnessResponse::Error { message });
                    }
                }
            }
            HarnessRequest::Start { config, prior_state } => {
                let Some(data) = self.data.clone() else {
                    self.send(HarnessResponse::Error { message: "start before init".into() });
                    return Flow::Continue;
                };
                let run_id = self.config.run_id.clone();
                let built = match prior_state {
                    Some(state) => SimEngine::from_state(run_id, data, *state),
                    None => SimEngine::new(run_id, data, &config),
                };
                match built {
                    Ok(engine) => {
                        let state = Box::new(engine.snapshot());
                        self.engine = Some(engine);
                        self.running = true;
                        self.ticks_since_update = 0;
                        log::info!("harness: started");
                        self.send(HarnessResponse::StartComplete { state });
                    }
                    Err(e) => self.send(HarnessResponse::Error { message: e.to_string() }),
                }
            }
            HarnessRequest::Stop => {
                if self.running {
                    self.running = false;
                    self.send_state();
                }
                self.send(HarnessResponse::StopComplete);
            }
            HarnessRequest::SetTimeSpeed { multiplier } => {
                let Some(engine) = self.engine.as_mut() else {
                    self.send(HarnessResponse::Error { message: SimError::NotStarted.to_string() });
                    return Flow::Continue;
                };
                if let Err(e) = engine.apply_action(Action::SetTimeSpeed { speed: multiplier }) {
                    self.send(HarnessResponse::Error { message: e.to_string() });
                }
            }
            HarnessRequest::Action { id, action } => {
                let Some(engine) = self.engine.as_mut() else {
                    self.send(HarnessResponse::ActionError { id, message: SimError::NotStarted.to_string() });
                    return Flow::Continue;
                };
                let response = match engine.apply_action(action) {
                    Ok(result) => HarnessResponse::ActionComplete {
                        id,
                        success: true,
                        result,
                        state: Box::new(engine.snapshot()),
                    },
                    Err(e) => HarnessResponse::ActionError { id, message: e.to_string() },
                };
                self.send(response);
            }
            HarnessRequest::GetState => {
                if self.engine.is_some() {
                    self.send_state();
                } else {
                    self.send(HarnessResponse::Error { message: SimError::NotStarted.to_string() });
                }
            }
            HarnessRequest::Shutdown => {
                log::info!("harness: shutdown");
                return Flow::Exit;
            }
        }
        Flow::Continue
    }

    fn on_tick(&mut self) {
        let Some(engine) = self.engine.as_mut() else { return };
        let started = Instant::now();
        if let Err(e) = engine.step() {
            log::error!("harness: tick failed: {e}");
            self.running = false;
            self.send(HarnessResponse::Error { message: e.to_string() });
            return;
        }
        self.last_tick_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.ticks_since_update += 1;
        if self.ticks_since_update >= self.config.state_update_every.max(1) {
            self.ticks_since_update = 0;
            self.send_state();
        }
    }
}
