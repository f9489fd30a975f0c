//! Vehicle actuator
//!
//! The only component that writes to the link.

use sober_core::VehicleCommand;
use sober_transport::CommandWriter;
use sober_wire::command_text;
use tracing::{info, warn};

use crate::RuntimeResult;

pub struct VehicleActuator {
    writer: CommandWriter,
}

impl VehicleActuator {
    pub fn new(writer: CommandWriter) -> Self {
        VehicleActuator { writer }
    }

    /// Write commands in order, stopping at the first failure
    pub async fn apply(&mut self, commands: &[VehicleCommand]) -> RuntimeResult<()> {
        for &command in commands {
            self.writer.write(command).await?;
            if command.is_actuation() {
                info!(command = command_text(command), "Vehicle actuated");
            }
        }
        Ok(())
    }

    /// Write one command, logging instead of failing
    pub async fn send_best_effort(&mut self, command: VehicleCommand) {
        if let Err(e) = self.writer.write(command).await {
            warn!(command = command_text(command), error = %e, "Best-effort command not written");
        }
    }

    pub fn commands_written(&self) -> u64 {
        self.writer.written()
    }
}
