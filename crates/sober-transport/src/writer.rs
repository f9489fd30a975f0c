//! Command writer

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use sober_core::VehicleCommand;
use sober_wire::{command_text, encode_command};

use crate::{LinkWriter, TransportError, TransportResult};

/// Writes newline-terminated commands to the link, flushing after each
pub struct CommandWriter {
    inner: LinkWriter,
    written: u64,
}

impl CommandWriter {
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        CommandWriter {
            inner: Box::new(writer),
            written: 0,
        }
    }

    /// Wrap the write half returned by [`crate::LinkEndpoint::connect`]
    pub fn from_link(inner: LinkWriter) -> Self {
        CommandWriter { inner, written: 0 }
    }

    pub async fn write(&mut self, command: VehicleCommand) -> TransportResult<()> {
        self.inner
            .write_all(&encode_command(command))
            .await
            .map_err(TransportError::Write)?;
        self.inner.flush().await.map_err(TransportError::Write)?;
        self.written += 1;
        debug!(command = command_text(command), "Command written");
        Ok(())
    }

    /// Commands written so far
    pub fn written(&self) -> u64 {
        self.written
    }
}
