//! Management (command) channel reconfiguration.
//!
//! The server listens for administrative commands on a unix domain socket
//! described by the `control-socket` configuration entry. A reload only
//! touches the socket when its description actually changed, so a client
//! that sent the reload command over that socket still gets its answer.

#[cfg(unix)]
use std::path::{Path, PathBuf};

use serde::Serialize;
#[cfg(unix)]
use socket2::{Domain, SockAddr, Socket, Type};
use tracing::debug;
#[cfg(unix)]
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Pending connections queued on the command socket.
#[cfg(unix)]
const LISTEN_BACKLOG: i32 = 16;

/// Where and how the command channel listens.
///
/// Compared structurally: two descriptors built independently from equal
/// configuration are equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SocketDescriptor {
    pub socket_type: String,
    pub socket_name: String,
}

/// Opens and closes the command channel.
pub trait CommandChannel: Send {
    fn open(&mut self, descriptor: &SocketDescriptor) -> Result<()>;

    /// Closes the channel if one is open. Closing nothing is not an error.
    fn close(&mut self);
}

/// Brings the channel in line with the staged descriptor.
///
/// Nothing happens when both descriptors are absent or structurally equal.
/// Otherwise any open channel is closed first, then a new one is opened for
/// `staged` if there is one.
pub fn reconcile(
    channel: &mut dyn CommandChannel,
    staged: Option<&SocketDescriptor>,
    current: Option<&SocketDescriptor>,
) -> Result<()> {
    if staged == current {
        debug!("command channel configuration unchanged");
        return Ok(());
    }

    channel.close();
    if let Some(descriptor) = staged {
        channel.open(descriptor)?;
    }
    Ok(())
}

/// Stand-in for platforms without unix domain sockets.
///
/// Any attempt to open a channel fails the commit.
#[derive(Debug, Default)]
pub struct DisabledCommandChannel;

impl CommandChannel for DisabledCommandChannel {
    fn open(&mut self, descriptor: &SocketDescriptor) -> Result<()> {
        Err(Error::Commit(format!(
            "command channel '{}' is not supported on this platform",
            descriptor.socket_name
        )))
    }

    fn close(&mut self) {}
}

/// Command channel backed by a listening unix domain socket.
#[cfg(unix)]
#[derive(Default)]
pub struct UnixCommandChannel {
    listener: Option<(Socket, PathBuf)>,
}

#[cfg(unix)]
impl UnixCommandChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.listener.is_some()
    }

    /// The listening socket, for the caller's accept loop.
    pub fn socket(&self) -> Option<&Socket> {
        self.listener.as_ref().map(|(socket, _)| socket)
    }

    fn create_socket(path: &Path) -> std::io::Result<Socket> {
        let socket = Socket::new(Domain::UNIX, Type::STREAM, None)?;
        socket.set_nonblocking(true)?;
        socket.bind(&SockAddr::unix(path)?)?;
        socket.listen(LISTEN_BACKLOG)?;
        Ok(socket)
    }
}

#[cfg(unix)]
impl CommandChannel for UnixCommandChannel {
    fn open(&mut self, descriptor: &SocketDescriptor) -> Result<()> {
        if descriptor.socket_type != "unix" {
            return Err(Error::Commit(format!(
                "unsupported command socket type '{}'",
                descriptor.socket_type
            )));
        }

        let path = PathBuf::from(&descriptor.socket_name);
        if path.exists() {
            // Left behind by an earlier process; bind would fail with EADDRINUSE.
            std::fs::remove_file(&path).map_err(|error| {
                Error::Commit(format!(
                    "failed to remove stale command socket {}: {}",
                    path.display(),
                    error
                ))
            })?;
        }

        let socket = Self::create_socket(&path).map_err(|error| {
            Error::Commit(format!(
                "failed to open command socket {}: {}",
                path.display(),
                error
            ))
        })?;

        info!("command channel listening on {}", path.display());
        self.listener = Some((socket, path));
        Ok(())
    }

    fn close(&mut self) {
        if let Some((socket, path)) = self.listener.take() {
            drop(socket);
            if let Err(error) = std::fs::remove_file(&path) {
                warn!("failed to remove command socket {}: {}", path.display(), error);
            }
            info!("command channel on {} closed", path.display());
        }
    }
}

#[cfg(unix)]
impl Drop for UnixCommandChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingChannel {
        calls: Vec<String>,
    }

    impl CommandChannel for RecordingChannel {
        fn open(&mut self, descriptor: &SocketDescriptor) -> Result<()> {
            self.calls.push(format!("open {}", descriptor.socket_name));
            Ok(())
        }

        fn close(&mut self) {
            self.calls.push("close".to_string());
        }
    }

    fn descriptor(name: &str) -> SocketDescriptor {
        SocketDescriptor {
            socket_type: "unix".to_string(),
            socket_name: name.to_string(),
        }
    }

    #[test]
    fn test_both_absent_is_noop() {
        let mut channel = RecordingChannel::default();
        reconcile(&mut channel, None, None).unwrap();
        assert!(channel.calls.is_empty());
    }

    #[test]
    fn test_structurally_equal_is_noop() {
        let mut channel = RecordingChannel::default();
        let staged = descriptor("/tmp/kea.sock");
        let current = descriptor("/tmp/kea.sock");
        reconcile(&mut channel, Some(&staged), Some(&current)).unwrap();
        assert!(channel.calls.is_empty());
    }

    #[test]
    fn test_changed_closes_then_opens() {
        let mut channel = RecordingChannel::default();
        let staged = descriptor("/tmp/new.sock");
        let current = descriptor("/tmp/old.sock");
        reconcile(&mut channel, Some(&staged), Some(&current)).unwrap();
        assert_eq!(channel.calls, vec!["close", "open /tmp/new.sock"]);
    }

    #[test]
    fn test_added_and_removed() {
        let mut channel = RecordingChannel::default();
        reconcile(&mut channel, Some(&descriptor("/tmp/a.sock")), None).unwrap();
        assert_eq!(channel.calls, vec!["close", "open /tmp/a.sock"]);

        let mut channel = RecordingChannel::default();
        reconcile(&mut channel, None, Some(&descriptor("/tmp/a.sock"))).unwrap();
        assert_eq!(channel.calls, vec!["close"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_unix_channel_open_and_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.sock");
        let mut channel = UnixCommandChannel::new();
        channel
            .open(&descriptor(path.to_str().unwrap()))
            .unwrap();
        assert!(channel.is_open());
        assert!(path.exists());

        channel.close();
        assert!(!channel.is_open());
        assert!(!path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_unix_channel_rejects_other_types() {
        let mut channel = UnixCommandChannel::new();
        let result = channel.open(&SocketDescriptor {
            socket_type: "tcp".to_string(),
            socket_name: "127.0.0.1:8000".to_string(),
        });
        assert!(matches!(result, Err(Error::Commit(_))));
    }
}
