//! Interlock control loop

use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use sober_core::{Timestamp, VehicleCommand};
use sober_notify::NotificationDispatcher;
use sober_policy::{AuthorizationState, Decision, Input, Outcome, PolicyEngine};
use sober_registry::{BlockRegistry, RegistryError};
use sober_time::{Scheduler, SchedulerConfig, TickOutcome};
use sober_transport::LineReceiver;
use sober_wire::{decode_line, WireError};

use crate::{RuntimeError, RuntimeResult, VehicleActuator};

/// Load the persisted state, falling back to Unblocked when it cannot be read.
///
/// A corrupt record is moved aside so the next save starts a clean file.
pub fn restore_state(registry: &dyn BlockRegistry, now: Timestamp) -> AuthorizationState {
    match registry.load() {
        Ok(snapshot) => {
            info!(
                history = snapshot.history.len(),
                blocked = snapshot.block.is_some(),
                "Registry loaded"
            );
            AuthorizationState::restore(snapshot, now)
        }
        Err(RegistryError::Corrupt(reason)) => {
            error!(%reason, "Registry record corrupt; starting unblocked");
            match registry.quarantine() {
                Ok(Some(path)) => warn!(path = %path.display(), "Corrupt record kept for inspection"),
                Ok(None) => {}
                Err(e) => error!(error = %e, "Could not quarantine corrupt record"),
            }
            AuthorizationState::new()
        }
        Err(e) => {
            error!(error = %e, "Registry unreadable; starting unblocked");
            AuthorizationState::new()
        }
    }
}

/// Loop statistics
#[derive(Clone, Debug, Default)]
pub struct InterlockStats {
    pub lines: u64,
    pub rejected_lines: u64,
    pub transitions: u64,
    pub saves: u64,
    pub save_failures: u64,
    pub alerts: u64,
}

/// The interlock: one policy engine, one state, one link.
///
/// Sensor events may capture from the camera, which blocks for up to the
/// capture timeout per attempt. On a multi-thread runtime that work is moved
/// off the worker with `block_in_place`; on a current-thread runtime it runs
/// inline and stalls every other task (line reader, alert delivery) until it
/// returns. Shutdown is only observed between iterations.
pub struct Interlock {
    engine: PolicyEngine,
    state: AuthorizationState,
    registry: Box<dyn BlockRegistry>,
    actuator: VehicleActuator,
    dispatcher: NotificationDispatcher,
    lines: LineReceiver,
    scheduler: Scheduler,
    stats: InterlockStats,
    last_outcome: Option<Outcome>,
}

impl Interlock {
    pub fn new(
        engine: PolicyEngine,
        state: AuthorizationState,
        registry: Box<dyn BlockRegistry>,
        actuator: VehicleActuator,
        dispatcher: NotificationDispatcher,
        lines: LineReceiver,
        scheduler: SchedulerConfig,
    ) -> Self {
        Interlock {
            engine,
            state,
            registry,
            actuator,
            dispatcher,
            lines,
            scheduler: Scheduler::new(scheduler),
            stats: InterlockStats::default(),
            last_outcome: None,
        }
    }

    pub fn state(&self) -> &AuthorizationState {
        &self.state
    }

    pub fn stats(&self) -> &InterlockStats {
        &self.stats
    }

    /// Outcome of the most recent sensor event
    pub fn last_outcome(&self) -> Option<Outcome> {
        self.last_outcome
    }

    /// One loop iteration without pacing: at most one inbound line, then the
    /// clock tick.
    pub async fn step(&mut self) -> RuntimeResult<TickOutcome> {
        let mut outcome = TickOutcome::Idle;

        match self.lines.try_recv() {
            Ok(Ok(line)) => {
                self.stats.lines += 1;
                outcome = TickOutcome::Handled;
                match decode_line(&line) {
                    Ok(event) => {
                        debug!(event = event.name(), %line, "Sensor event");
                        self.transition(Input::Sensor(event)).await?;
                    }
                    Err(e) => self.reject_line(e),
                }
            }
            Ok(Err(e)) => {
                self.stats.lines += 1;
                self.reject_line(e);
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => return Err(RuntimeError::LinkClosed),
        }

        self.transition(Input::Tick).await?;
        Ok(outcome)
    }

    /// Run until `shutdown` flips to true (or its sender goes away), or
    /// until the link closes. The final state is saved either way.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> RuntimeResult<()> {
        info!(phase = %self.state.phase(), "Interlock running");

        let result = loop {
            if *shutdown.borrow() {
                break Ok(());
            }

            let outcome = match self.step().await {
                Ok(outcome) => outcome,
                Err(RuntimeError::LinkClosed) => {
                    error!("Sensor link closed; stopping");
                    break Err(RuntimeError::LinkClosed);
                }
                Err(e) => {
                    error!(error = %e, "Loop iteration failed");
                    self.actuator.send_best_effort(VehicleCommand::FaceError).await;
                    TickOutcome::Failed
                }
            };

            tokio::select! {
                _ = self.scheduler.pace(outcome) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break Ok(());
                    }
                }
            }
        };

        info!("Interlock stopping");
        self.save_final();
        result
    }

    /// Persist the current state unconditionally
    pub fn save_final(&mut self) {
        self.save();
    }

    async fn transition(&mut self, input: Input) -> RuntimeResult<()> {
        let state = std::mem::take(&mut self.state);
        let engine = &mut self.engine;
        let (state, decision) = match input {
            Input::Sensor(_) => run_blocking(|| engine.handle(state, input)),
            Input::Tick => engine.handle(state, input),
        };
        self.state = state;

        if let Input::Sensor(_) = input {
            self.last_outcome = Some(decision.outcome);
        }
        if !decision.is_noop() {
            self.stats.transitions += 1;
        }
        self.apply(decision).await
    }

    /// Save, then commands, then alert. A failed save does not hold back
    /// the commands.
    async fn apply(&mut self, decision: Decision) -> RuntimeResult<()> {
        if decision.persist {
            self.save();
        }

        self.actuator.apply(&decision.commands).await?;

        if let Some(alert) = decision.alert {
            self.stats.alerts += 1;
            // Detached; delivery never feeds back into the loop
            let _ = self.dispatcher.dispatch(alert);
        }
        Ok(())
    }

    fn save(&mut self) {
        match self.registry.save(&self.state.snapshot()) {
            Ok(()) => self.stats.saves += 1,
            Err(e) => {
                self.stats.save_failures += 1;
                error!(error = %e, "Registry save failed; continuing with in-memory state");
            }
        }
    }

    fn reject_line(&mut self, error: WireError) {
        self.stats.rejected_lines += 1;
        match error {
            WireError::UnrecognizedLine(line) => debug!(%line, "Ignoring unrecognized line"),
            other => warn!(error = %other, "Ignoring bad line"),
        }
    }
}

/// Run `f`, which may block on capture, without holding a runtime worker
fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}
