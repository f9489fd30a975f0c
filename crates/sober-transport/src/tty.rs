//! Serial TTY stream
//!
//! The device is opened non-blocking, put in raw mode at the requested baud
//! rate and registered with the reactor. Reads and writes wait on separate
//! readiness, so a reader parked on an idle line never holds back a command.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{ready, Context, Poll};

use nix::sys::termios::{self, BaudRate, ControlFlags, SetArg};
use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Handle to an open TTY; clones share the descriptor
#[derive(Clone)]
pub struct TtyStream {
    fd: Arc<AsyncFd<File>>,
}

impl TtyStream {
    /// Open `path` in raw 8N1 mode at `baud`. Fails for anything that is
    /// not a terminal. Must be called within a tokio runtime.
    pub fn open(path: &Path, baud: u32) -> io::Result<Self> {
        let rate = baud_rate(baud)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(nix::libc::O_NOCTTY | nix::libc::O_NONBLOCK)
            .open(path)?;
        configure_raw(&file, rate)?;

        Ok(TtyStream {
            fd: Arc::new(AsyncFd::new(file)?),
        })
    }
}

fn configure_raw(file: &File, rate: BaudRate) -> io::Result<()> {
    let mut attrs = termios::tcgetattr(file)?;
    termios::cfmakeraw(&mut attrs);
    termios::cfsetspeed(&mut attrs, rate)?;
    attrs.control_flags |= ControlFlags::CLOCAL | ControlFlags::CREAD;
    termios::tcsetattr(file, SetArg::TCSANOW, &attrs)?;
    Ok(())
}

fn baud_rate(baud: u32) -> io::Result<BaudRate> {
    let rate = match baud {
        1200 => BaudRate::B1200,
        2400 => BaudRate::B2400,
        4800 => BaudRate::B4800,
        9600 => BaudRate::B9600,
        19200 => BaudRate::B19200,
        38400 => BaudRate::B38400,
        57600 => BaudRate::B57600,
        115200 => BaudRate::B115200,
        other => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported baud rate {other}"),
            ))
        }
    };
    Ok(rate)
}

impl AsyncRead for TtyStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        loop {
            let mut guard = ready!(self.fd.poll_read_ready(cx))?;
            let unfilled = buf.initialize_unfilled();
            let attempt = guard.try_io(|inner| {
                let mut file: &File = inner.get_ref();
                file.read(unfilled)
            });
            match attempt {
                Ok(Ok(len)) => {
                    buf.advance(len);
                    return Poll::Ready(Ok(()));
                }
                Ok(Err(e)) => return Poll::Ready(Err(e)),
                Err(_would_block) => continue,
            }
        }
    }
}

impl AsyncWrite for TtyStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        data: &[u8],
    ) -> Poll<io::Result<usize>> {
        loop {
            let mut guard = ready!(self.fd.poll_write_ready(cx))?;
            let attempt = guard.try_io(|inner| {
                let mut file: &File = inner.get_ref();
                file.write(data)
            });
            match attempt {
                Ok(result) => return Poll::Ready(result),
                Err(_would_block) => continue,
            }
        }
    }

    // Bytes handed to the kernel are already queued for the line
    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Pty master as a plain blocking file, plus the slave's path
#[cfg(all(test, target_os = "linux"))]
pub(crate) fn open_pty() -> (File, std::path::PathBuf) {
    use nix::fcntl::OFlag;
    use nix::pty::{grantpt, posix_openpt, ptsname_r, unlockpt};
    use std::os::fd::{FromRawFd, IntoRawFd};

    let master = posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY).unwrap();
    grantpt(&master).unwrap();
    unlockpt(&master).unwrap();
    let slave = std::path::PathBuf::from(ptsname_r(&master).unwrap());
    let master = unsafe { File::from_raw_fd(master.into_raw_fd()) };
    (master, slave)
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use crate::DEFAULT_BAUD_RATE;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn test_unsupported_baud_rejected() {
        let err = baud_rate(1234).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(baud_rate(DEFAULT_BAUD_RATE).is_ok());
    }

    #[tokio::test]
    async fn test_regular_file_is_not_a_tty() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(TtyStream::open(file.path(), DEFAULT_BAUD_RATE).is_err());
    }

    #[tokio::test]
    async fn test_raw_mode_passes_bytes_unchanged() {
        let (mut master, slave) = open_pty();
        let mut tty = TtyStream::open(&slave, DEFAULT_BAUD_RATE).unwrap();

        tty.write_all(b"FACE:SAME\n").await.unwrap();
        let mut out = [0u8; 10];
        master.read_exact(&mut out).unwrap();
        assert_eq!(&out, b"FACE:SAME\n");

        master.write_all(b"RECHECK\n").unwrap();
        let mut input = [0u8; 8];
        tty.read_exact(&mut input).await.unwrap();
        assert_eq!(&input, b"RECHECK\n");
    }
}
