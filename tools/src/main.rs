//! sim-runner: headless simulation runner for the Dyson swarm core.
//!
//! Usage:
//!   sim-runner --ticks 365 --dt 1.0 --db run.db
//!   sim-runner --resume run-1 --db run.db --ticks 100
//!   sim-runner --ipc-mode            (JSON lines on stdin/stdout)

use anyhow::{Context, Result};
use dyson_core::{
    command::Action,
    config::{GameData, NewGameConfig},
    engine::SimEngine,
    event::SimEvent,
    harness::{HarnessConfig, HarnessHandle, HarnessRequest},
    snapshot::SimSnapshot,
    state::Activity,
    store::SimStore,
};
use std::collections::BTreeMap;
use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ticks = parse_arg(&args, "--ticks", 365u64);
    let dt = parse_arg(&args, "--dt", 1.0f64);
    let harvest = parse_arg(&args, "--harvest", 0.5f64);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = string_arg(&args, "--db");
    let resume = string_arg(&args, "--resume");
    let data_dir = string_arg(&args, "--data-dir").unwrap_or_else(|| "./data".into());
    let run_id = string_arg(&args, "--run-id")
        .or_else(|| resume.clone())
        .unwrap_or_else(|| format!("run-{}", wall_clock_secs()));

    let data = load_data(&data_dir)?;

    if ipc_mode {
        return run_ipc_loop(HarnessConfig::new(run_id, data));
    }

    println!("Dyson swarm: sim-runner");
    println!("  run_id:    {run_id}");
    println!("  ticks:     {ticks}");
    println!("  dt:        {dt} days");
    println!("  db:        {}", db.as_deref().unwrap_or("(none)"));
    println!("  data_dir:  {data_dir}");
    println!();

    let store = match &db {
        Some(path) => {
            let store = SimStore::open(path)?;
            store.migrate()?;
            Some(store)
        }
        None => None,
    };

    let mut engine = match (&resume, store) {
        (Some(id), Some(store)) => {
            let (tick, json) = store
                .latest_snapshot(id)?
                .with_context(|| format!("no snapshot stored for run {id}"))?;
            println!("  resuming from tick {tick}");
            let snapshot = SimSnapshot::from_json(&json)?;
            if snapshot.run_id != *id {
                log::warn!("sim-runner: snapshot for {id} is labelled {}", snapshot.run_id);
            }
            SimEngine::from_state(run_id.clone(), data, snapshot.state)?.with_store(store)
        }
        (Some(_), None) => anyhow::bail!("--resume needs --db"),
        (None, store) => {
            let config = NewGameConfig::default();
            let mut engine = SimEngine::new(run_id.clone(), data, &config)?;
            if let Some(store) = store {
                store.insert_run(&run_id, env!("CARGO_PKG_VERSION"), &serde_json::to_string(&config)?)?;
                engine = engine.with_store(store);
            }
            let start_zone = config.starting_zone.clone();
            let mut allocations = BTreeMap::new();
            allocations.insert(Activity::Harvest, harvest.clamp(0.0, 1.0));
            allocations.insert(Activity::Replicate, (1.0 - harvest).clamp(0.0, 1.0));
            engine
                .apply_action(Action::AllocateProbes { zone: start_zone, allocations })
                .map_err(|e| anyhow::anyhow!("initial allocation rejected: {e}"))?;
            engine
        }
    };

    let events = engine.run_ticks(ticks, dt)?;
    engine.save_snapshot()?;
    print_summary(&engine, &events);
    Ok(())
}

fn load_data(dir: &str) -> Result<GameData> {
    if Path::new(dir).join("zones.json").exists() {
        GameData::load(dir)
    } else {
        log::warn!("no game data in {dir}; using built-in defaults");
        Ok(GameData::default_test())
    }
}

/// Bridge JSON lines on stdin/stdout onto a harness thread.
fn run_ipc_loop(config: HarnessConfig) -> Result<()> {
    let handle = HarnessHandle::spawn(config)?;
    let requests = handle.sender();

    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HarnessRequest>(&line) {
                Ok(request) => {
                    if requests.send(request).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    let err_json = serde_json::json!({ "type": "error", "message": e.to_string() });
                    println!("{err_json}");
                }
            }
        }
        let _ = requests.send(HarnessRequest::Shutdown);
    });

    let mut stdout = io::stdout();
    for response in handle.responses().iter() {
        match serde_json::to_string(&response) {
            Ok(json) => {
                writeln!(stdout, "{json}")?;
                stdout.flush()?;
            }
            Err(e) => log::warn!("sim-runner: cannot serialize response: {e}"),
        }
    }
    handle.shutdown();
    Ok(())
}

fn print_summary(engine: &SimEngine, events: &[SimEvent]) {
    let state = engine.state();
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for event in events {
        *counts.entry(event.type_name()).or_insert(0) += 1;
    }

    println!("=== RUN SUMMARY ===");
    println!("  run_id:         {}", engine.run_id);
    println!("  final tick:     {}", state.clock.current_tick);
    println!("  elapsed days:   {:.2}", state.clock.elapsed_days);
    println!("  probes:         {}", state.total_probes());
    println!("  metal:          {:.1} kg", state.metal);
    println!("  slag:           {:.1} kg", state.slag);
    println!(
        "  energy:         {:.3e} W / {:.3e} W (throttle {:.3})",
        state.energy.production_w, state.energy.consumption_w, state.energy.throttle
    );
    println!("  intelligence:   {:.3e} FLOPS", state.energy.intelligence_flops);
    println!(
        "  dyson:          {:.3e} kg ({:.6}%)",
        state.dyson.mass_kg,
        state.dyson.progress * 100.0
    );
    println!("  transfers:      {}", state.transfers.len());

    println!();
    println!("=== SKILLS ===");
    for (skill, value) in state.skills.iter() {
        println!("  {:<20} {value:.4}", skill.as_str());
    }

    println!();
    println!("=== EVENTS ===");
    if counts.is_empty() {
        println!("  (none)");
    }
    for (kind, n) in counts {
        println!("  {kind:<26} {n}");
    }
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn string_arg(args: &[String], flag: &str) -> Option<String> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].clone())
}

fn wall_clock_secs() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
