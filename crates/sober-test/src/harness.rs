//! In-process interlock harness
//!
//! Runs a real [`Interlock`] over an in-memory duplex link, with a manual
//! clock, a memory registry and scripted capture. The harness plays the
//! microcontroller: it writes sensor lines and reads back commands.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use sober_core::{Timestamp, VehicleCommand};
use sober_notify::{FixedLocation, Location, NotificationDispatcher};
use sober_policy::{AuthorizationState, PolicyConfig, PolicyEngine};
use sober_registry::MemoryRegistry;
use sober_runtime::{restore_state, Interlock, RuntimeResult, VehicleActuator};
use sober_time::{Clock, ManualClock, SchedulerConfig, TickOutcome};
use sober_transport::{start_line_reader, CommandWriter};
use sober_wire::{decode_command, LineFramer};

use crate::{RecordingNotifier, ScriptedCamera, ScriptedComparator};

/// Wall-clock start of every harness run
pub const HARNESS_EPOCH: Timestamp = Timestamp(1_700_000_000_000_000);

const LINK_BUFFER: usize = 4096;
const DRAIN_WAIT: Duration = Duration::from_millis(20);
const MAX_WAIT_STEPS: usize = 200;

pub struct InterlockHarness {
    interlock: Interlock,
    device: DuplexStream,
    framer: LineFramer,
    pub registry: MemoryRegistry,
    pub clock: ManualClock,
    pub camera: ScriptedCamera,
    pub comparator: ScriptedComparator,
    pub notifier: RecordingNotifier,
}

impl InterlockHarness {
    pub fn new() -> Self {
        Self::with_registry(MemoryRegistry::new())
    }

    /// Start against an existing registry, as after a restart
    pub fn with_registry(registry: MemoryRegistry) -> Self {
        Self::build(
            registry,
            ManualClock::new(HARNESS_EPOCH),
            ScriptedCamera::new(),
            ScriptedComparator::new(),
            RecordingNotifier::new(),
        )
    }

    fn build(
        registry: MemoryRegistry,
        clock: ManualClock,
        camera: ScriptedCamera,
        comparator: ScriptedComparator,
        notifier: RecordingNotifier,
    ) -> Self {
        let (host, device) = tokio::io::duplex(LINK_BUFFER);
        let (read, write) = tokio::io::split(host);
        let (lines, _reader) = start_line_reader(read, 16);

        let state = restore_state(&registry, clock.now());
        let engine = PolicyEngine::new(
            PolicyConfig::default(),
            camera.clone(),
            comparator.clone(),
            clock.clone(),
        );
        let dispatcher = NotificationDispatcher::new(
            Arc::new(notifier.clone()),
            Arc::new(FixedLocation(Location {
                city: Some("Test City".into()),
                ..Location::unknown()
            })),
        );
        let interlock = Interlock::new(
            engine,
            state,
            Box::new(registry.clone()),
            VehicleActuator::new(CommandWriter::new(write)),
            dispatcher,
            lines,
            SchedulerConfig::default(),
        );

        InterlockHarness {
            interlock,
            device,
            framer: LineFramer::new(),
            registry,
            clock,
            camera,
            comparator,
            notifier,
        }
    }

    /// Simulate a process restart: same registry and clock, fresh loop
    pub fn restart(self) -> Self {
        let InterlockHarness {
            registry,
            clock,
            camera,
            comparator,
            notifier,
            ..
        } = self;
        Self::build(registry, clock, camera, comparator, notifier)
    }

    pub fn state(&self) -> &AuthorizationState {
        self.interlock.state()
    }

    pub fn interlock(&self) -> &Interlock {
        &self.interlock
    }

    /// Send one sensor line and step until the loop has consumed it
    pub async fn send(&mut self, line: &str) -> RuntimeResult<()> {
        self.device
            .write_all(format!("{line}\n").as_bytes())
            .await
            .unwrap_or_else(|e| panic!("harness link write failed: {e}"));

        for _ in 0..MAX_WAIT_STEPS {
            if self.interlock.step().await? == TickOutcome::Handled {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        panic!("interlock never consumed line {line:?}");
    }

    /// One iteration with no inbound line
    pub async fn tick(&mut self) -> RuntimeResult<TickOutcome> {
        self.interlock.step().await
    }

    pub fn advance(&self, dt: Duration) -> Timestamp {
        self.clock.advance(dt)
    }

    /// Commands written since the last call
    pub async fn commands(&mut self) -> Vec<VehicleCommand> {
        let mut buf = [0u8; 256];
        loop {
            match tokio::time::timeout(DRAIN_WAIT, self.device.read(&mut buf)).await {
                Ok(Ok(n)) if n > 0 => self.framer.push(&buf[..n]),
                _ => break,
            }
        }

        let mut commands = Vec::new();
        while let Some(line) = self.framer.next_line() {
            let Ok(line) = line else { continue };
            if let Ok(command) = decode_command(&line) {
                commands.push(command);
            }
        }
        commands
    }

    /// Wait for detached alert deliveries to reach the notifier
    pub async fn wait_for_alerts(&self, count: usize) -> usize {
        for _ in 0..MAX_WAIT_STEPS {
            if self.notifier.attempts() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        self.notifier.attempts()
    }
}

impl Default for InterlockHarness {
    fn default() -> Self {
        Self::new()
    }
}
