//! Link endpoints

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::info;

#[cfg(unix)]
use crate::TtyStream;
use crate::{TransportError, TransportResult};

const TCP_SCHEME: &str = "tcp://";

/// Default serial device of the reference hardware
pub const DEFAULT_DEVICE: &str = "/dev/ttyACM0";

/// Baud rate the sensor firmware talks at
pub const DEFAULT_BAUD_RATE: u32 = 9600;

pub type LinkReader = Box<dyn AsyncRead + Send + Unpin>;
pub type LinkWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Where the microcontroller is reachable
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkEndpoint {
    /// Serial TTY, put in raw mode at the configured baud rate
    Device(PathBuf),
    /// Serial-to-TCP bridge, `host:port`
    Tcp(String),
}

impl LinkEndpoint {
    pub fn parse(s: &str) -> TransportResult<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TransportError::InvalidEndpoint("empty endpoint".into()));
        }

        match s.strip_prefix(TCP_SCHEME) {
            Some(addr) => {
                let valid = addr
                    .rsplit_once(':')
                    .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok())
                    .unwrap_or(false);
                if !valid {
                    return Err(TransportError::InvalidEndpoint(format!(
                        "expected tcp://host:port, got {s}"
                    )));
                }
                Ok(LinkEndpoint::Tcp(addr.to_string()))
            }
            None if s.contains("://") => Err(TransportError::InvalidEndpoint(format!(
                "unsupported scheme in {s}"
            ))),
            None => Ok(LinkEndpoint::Device(PathBuf::from(s))),
        }
    }

    /// Open the link, split into independent read and write halves.
    /// `baud_rate` applies to devices only.
    pub async fn connect(&self, baud_rate: u32) -> TransportResult<(LinkReader, LinkWriter)> {
        let open_err = |source: std::io::Error| TransportError::Open {
            endpoint: self.to_string(),
            source,
        };

        let halves: (LinkReader, LinkWriter) = match self {
            LinkEndpoint::Device(path) => open_device(path, baud_rate).map_err(open_err)?,
            LinkEndpoint::Tcp(addr) => {
                let stream = TcpStream::connect(addr.as_str()).await.map_err(open_err)?;
                stream.set_nodelay(true).map_err(open_err)?;
                let (read, write) = stream.into_split();
                (Box::new(read) as LinkReader, Box::new(write) as LinkWriter)
            }
        };

        info!(endpoint = %self, baud_rate, "Sensor link open");
        Ok(halves)
    }
}

#[cfg(unix)]
fn open_device(path: &Path, baud_rate: u32) -> std::io::Result<(LinkReader, LinkWriter)> {
    let tty = TtyStream::open(path, baud_rate)?;
    Ok((Box::new(tty.clone()), Box::new(tty)))
}

#[cfg(not(unix))]
fn open_device(_path: &Path, _baud_rate: u32) -> std::io::Result<(LinkReader, LinkWriter)> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "serial devices are only supported on unix",
    ))
}

impl Default for LinkEndpoint {
    fn default() -> Self {
        LinkEndpoint::Device(PathBuf::from(DEFAULT_DEVICE))
    }
}

impl FromStr for LinkEndpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LinkEndpoint::parse(s)
    }
}

impl fmt::Display for LinkEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkEndpoint::Device(path) => write!(f, "{}", path.display()),
            LinkEndpoint::Tcp(addr) => write!(f, "{TCP_SCHEME}{addr}"),
        }
    }
}
