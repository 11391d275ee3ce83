//! Fan control loop.
//!
//! Periodic reconciliation across one or two powerboards: pull tach and
//! wattage, refresh host/drive temperatures, recompute wall targets, and
//! push only the walls that changed. Mirrors the hardened loop's
//! structure (panic-resistant iterations, fallback on repeated failure,
//! `tokio::select!` between the poll sleep and a reload notify) but
//! replaced end to end for fan walls and powerboards instead of
//! sysfs PWM pairs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use fanwall_core::{
    apply_target_to_triple, binding_for_wall, recompute, BoardGate, FanWall, FanwallError,
    Powerboard, Services,
};
use tokio::sync::{Mutex as AsyncMutex, Notify};
use tracing::{debug, error, info, warn};

use crate::link::PowerboardLink;

const FALLBACK_FAN_PERCENT: u8 = fanwall_core::constants::SAFE_DEFAULT_FAN_PERCENT as u8;
const MAX_CONSECUTIVE_ERRORS: u32 = 10;

/// One board's link plus its pair of binary mutexes: `link` bounds one
/// request/response at a time; `update_gate` implements the
/// try-acquire/drop debounce for user-driven manual edits. The
/// scheduler's own overlap guard (`tick_gate`) is separate from both —
/// it decides whether this tick touches the board at all.
pub struct BoardSlot {
    pub location: u8,
    link: StdMutex<PowerboardLink>,
    tick_gate: BoardGate,
    update_gate: BoardGate,
    telemetry: StdMutex<Powerboard>,
}

impl BoardSlot {
    fn new(location: u8, link: PowerboardLink) -> Self {
        let telemetry = Powerboard {
            location,
            hardware_revision: link.metadata.hardware_revision.clone(),
            firmware_version: link.metadata.firmware_version.clone(),
            saved_pwm: link.initial_pwm,
            current_pwm: link.initial_pwm,
            last_tach_rpm: (0, 0, 0),
            last_wattage: [0.0; 4],
        };
        Self {
            location,
            link: StdMutex::new(link),
            tick_gate: BoardGate::new(),
            update_gate: BoardGate::new(),
            telemetry: StdMutex::new(telemetry),
        }
    }

    pub fn current_pwm(&self) -> (u8, u8, u8) {
        self.telemetry.lock().expect("lock poisoned").current_pwm
    }
}

pub struct ControlState {
    pub automatic_control: AtomicBool,
    pub poll_interval_ms: AtomicU64,
    pub reload_notify: Notify,
    pub boards: HashMap<u8, Arc<BoardSlot>>,
    pub services: AsyncMutex<Services>,
}

impl ControlState {
    /// Opens whichever of board locations 1 and 2 respond; a board that
    /// fails to open is simply absent — its walls are hidden from
    /// external APIs and not ticked, per the binding rule in C5.
    pub fn new(services: Services, ports: &HashMap<u8, String>) -> Self {
        let mut boards = HashMap::new();
        for (&location, port) in ports {
            match PowerboardLink::open(port) {
                Ok(link) => {
                    info!(location, port, "powerboard link opened");
                    boards.insert(location, Arc::new(BoardSlot::new(location, link)));
                }
                Err(e) => {
                    warn!(location, port, error = %e, "powerboard not available, walls on it are hidden");
                }
            }
        }

        let poll_ms = (services.fan_service_state.automatic_update_interval * 1000.0) as u64;

        Self {
            automatic_control: AtomicBool::new(services.fan_service_state.automatic_control_enabled),
            poll_interval_ms: AtomicU64::new(poll_ms.max(100)),
            reload_notify: Notify::new(),
            boards,
            services: AsyncMutex::new(services),
        }
    }

    pub fn signal_reload(&self) {
        self.reload_notify.notify_one();
    }

    /// Manual slider edit: debounced per board. Returns `false` if an
    /// update for this board was already in flight and this one was
    /// dropped (S7).
    pub async fn request_manual_update(&self, wall_id: u8, clamped_target: u8) -> bool {
        let Some(binding) = binding_for_wall(wall_id) else {
            return false;
        };
        let Some(board) = self.boards.get(&binding.board_location) else {
            return false;
        };
        let Some(_guard) = board.update_gate.try_acquire() else {
            debug!(wall_id, "manual update dropped, one already in flight for this board");
            return false;
        };

        let board = board.clone();
        let current = board.current_pwm();
        let triple = apply_target_to_triple(current, binding.rows, clamped_target);
        let result = tokio::task::spawn_blocking(move || {
            let mut link = board.link.lock().expect("lock poisoned");
            link.update_fan_speed(triple.0, triple.1, triple.2)?;
            board.telemetry.lock().expect("lock poisoned").current_pwm = triple;
            Ok::<(), FanwallError>(())
        })
        .await;

        match result {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(wall_id, error = %e, "manual update failed");
                false
            }
            Err(e) => {
                error!(wall_id, error = %e, "manual update task panicked");
                false
            }
        }
    }
}

pub async fn run_control_loop(state: Arc<ControlState>, shutdown: Arc<AtomicBool>) {
    info!("fan control loop starting");

    let mut consecutive_errors: u32 = 0;

    loop {
        if shutdown.load(Ordering::SeqCst) {
            info!("fan control loop shutting down");
            break;
        }

        match run_tick(&state).await {
            Ok(()) => {
                if consecutive_errors > 0 {
                    debug!(recovered_after = consecutive_errors, "tick recovered");
                    consecutive_errors = 0;
                }
            }
            Err(e) => {
                consecutive_errors += 1;
                if consecutive_errors == 1 || consecutive_errors % MAX_CONSECUTIVE_ERRORS == 0 {
                    error!(count = consecutive_errors, error = %e, "tick failed");
                }
            }
        }

        let poll_ms = state.poll_interval_ms.load(Ordering::SeqCst);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(poll_ms)) => {}
            _ = state.reload_notify.notified() => {
                debug!("control loop woken by reload signal");
            }
        }
    }

    info!("fan control loop stopped");
}

async fn run_tick(state: &ControlState) -> Result<(), FanwallError> {
    // Step 1: pull tach+wattage for every board whose previous tick has
    // already finished.
    for board in state.boards.values() {
        let Some(_guard) = board.tick_gate.try_acquire() else {
            debug!(location = board.location, "previous tick still outstanding, skipping board");
            continue;
        };
        let board = board.clone();
        let pulled = tokio::task::spawn_blocking(move || {
            let mut link = board.link.lock().expect("lock poisoned");
            let tach = link.read_tach()?;
            let raw_wattage = link.read_wattage()?;
            let mut telemetry = board.telemetry.lock().expect("lock poisoned");
            telemetry.last_tach_rpm = tach;
            telemetry.last_wattage = telemetry.decode_wattage(raw_wattage);
            Ok::<(), FanwallError>(())
        })
        .await;

        match pulled {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.is_transient() => {
                warn!(error = %e, "board pull failed, cached readings retained");
            }
            Ok(Err(e)) => return Err(e),
            Err(e) => error!(error = %e, "board pull task panicked"),
        }
    }

    if !state.automatic_control.load(Ordering::SeqCst) {
        return Ok(());
    }

    // Steps 2-4: one consistent-snapshot recompute of wall targets.
    let mut services = state.services.lock().await;
    let walls: Vec<FanWall> = services.fan_service_state.fan_walls.values().cloned().collect();
    let profiles = services.fan_profiles.profiles.clone();
    let drive_monitors = services.drive_monitors().clone();

    let diffs = recompute(
        &mut services.sensor_registry,
        &services.drive_registry,
        &drive_monitors,
        &walls,
        &profiles,
    );

    // Step 5: push only the diffs, applying the new target onto the
    // wall record before dropping the lock.
    for (wall_id, target) in &diffs {
        if let Some(wall) = services.fan_service_state.fan_walls.get_mut(&wall_id.to_string()) {
            wall.target = *target;
        }
    }
    drop(services);

    for (wall_id, target) in diffs {
        push_wall_target(state, wall_id, target).await;
    }

    Ok(())
}

async fn push_wall_target(state: &ControlState, wall_id: u8, target: u8) {
    let Some(binding) = binding_for_wall(wall_id) else {
        return;
    };
    let Some(board) = state.boards.get(&binding.board_location) else {
        return;
    };
    let board = board.clone();
    let current = board.current_pwm();
    let triple = apply_target_to_triple(current, binding.rows, target);

    let result = tokio::task::spawn_blocking(move || {
        let mut link = board.link.lock().expect("lock poisoned");
        link.update_fan_speed(triple.0, triple.1, triple.2)?;
        let mut telemetry = board.telemetry.lock().expect("lock poisoned");
        telemetry.current_pwm = triple;
        Ok::<(), FanwallError>(())
    })
    .await;

    match result {
        Ok(Ok(())) => {
            let mut services = state.services.lock().await;
            if let Some(wall) = services.fan_service_state.fan_walls.get_mut(&wall_id.to_string()) {
                wall.last_applied = target;
            }
        }
        Ok(Err(e)) => warn!(wall_id, error = %e, "failed to push wall target"),
        Err(e) => error!(wall_id, error = %e, "push task panicked"),
    }
}

/// Applies the safe default to every known wall, used when the
/// automatic-control flag is off at boot or after too many consecutive
/// tick failures leave target state suspect.
pub async fn apply_fallback_speed(state: &ControlState) {
    for board in state.boards.values() {
        let board = board.clone();
        let triple = (FALLBACK_FAN_PERCENT, FALLBACK_FAN_PERCENT, FALLBACK_FAN_PERCENT);
        let outcome = tokio::task::spawn_blocking(move || {
            let mut link = board.link.lock().expect("lock poisoned");
            link.update_fan_speed(triple.0, triple.1, triple.2)?;
            board.telemetry.lock().expect("lock poisoned").current_pwm = triple;
            Ok::<(), FanwallError>(())
        })
        .await;

        if let Ok(Err(e)) = outcome {
            warn!(error = %e, "failed to apply fallback speed");
        }
    }
}
