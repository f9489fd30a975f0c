//! Background line reader

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use sober_wire::{LineFramer, WireResult};

/// Read chunk size
pub const READ_CHUNK_SIZE: usize = 512;

/// Default depth of the inbound line queue
pub const DEFAULT_LINE_QUEUE: usize = 64;

/// Framed inbound lines. The channel closes when the link does.
pub type LineReceiver = mpsc::Receiver<WireResult<String>>;

pub type LineSender = mpsc::Sender<WireResult<String>>;

/// Start a background task that frames bytes from `reader` into lines.
///
/// The task ends on EOF, on a read error, or when the receiver is dropped;
/// in the first two cases the receiver sees the channel close.
pub fn start_line_reader<R>(reader: R, queue: usize) -> (LineReceiver, JoinHandle<()>)
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let (tx, rx) = mpsc::channel(queue.max(1));
    let handle = tokio::spawn(read_lines(reader, tx));
    (rx, handle)
}

async fn read_lines<R>(mut reader: R, tx: LineSender)
where
    R: AsyncRead + Unpin,
{
    let mut framer = LineFramer::new();
    let mut buf = vec![0u8; READ_CHUNK_SIZE];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                info!("Sensor link reached EOF");
                break;
            }
            Ok(len) => {
                framer.push(&buf[..len]);
                while let Some(line) = framer.next_line() {
                    if tx.send(line).await.is_err() {
                        debug!("Line receiver dropped");
                        return;
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Sensor link read error");
                break;
            }
        }
    }

    if framer.pending() > 0 {
        debug!(bytes = framer.pending(), "Dropping unterminated tail");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sober_wire::WireError;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_lines_arrive_in_order() {
        let (mut device, host) = tokio::io::duplex(64);
        let (mut rx, _task) = start_line_reader(host, 8);

        device.write_all(b"ALCOHOL:7").await.unwrap();
        device.write_all(b"50\r\nBLO").await.unwrap();
        device.write_all(b"CKED\n").await.unwrap();

        assert_eq!(rx.recv().await.unwrap().unwrap(), "ALCOHOL:750");
        assert_eq!(rx.recv().await.unwrap().unwrap(), "BLOCKED");
    }

    #[tokio::test]
    async fn test_channel_closes_on_eof() {
        let (mut device, host) = tokio::io::duplex(64);
        let (mut rx, task) = start_line_reader(host, 8);

        device.write_all(b"RECHECK\npartial").await.unwrap();
        drop(device);

        assert_eq!(rx.recv().await.unwrap().unwrap(), "RECHECK");
        assert!(rx.recv().await.is_none());
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_overlong_line_reported() {
        let (mut device, host) = tokio::io::duplex(1024);
        let (mut rx, _task) = start_line_reader(host, 8);

        let mut junk = vec![b'X'; 600];
        junk.push(b'\n');
        device.write_all(&junk).await.unwrap();
        device.write_all(b"CMD:CHECK_FACE\n").await.unwrap();

        assert!(matches!(
            rx.recv().await.unwrap(),
            Err(WireError::LineTooLong { .. })
        ));
        assert_eq!(rx.recv().await.unwrap().unwrap(), "CMD:CHECK_FACE");
    }
}
