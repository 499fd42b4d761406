//! IPC bus adapter over a Unix datagram socket.
//!
//! Management clients bind their own socket path and exchange one JSON
//! object per datagram with the bridge:
//!
//! ```text
//!   client ──▶ {"method":"Subscribe"}
//!   client ──▶ {"method":"SubmitResponse","id":7,"seq":42,"netfn":7,"lun":0,"cmd":1,"cc":0,"data":[]}
//!   client ◀── {"type":"Return","id":7,"result":0}
//!   client ◀── {"type":"Error","id":7,"errno":22,"name":"EINVAL","message":"No matching request"}
//!   subs   ◀── {"type":"ReceivedMessage","seq":42,"netfn":6,"lun":0,"cmd":1,"data":[]}
//! ```
//!
//! Datagrams from unbound (anonymous) clients cannot be answered and are
//! dropped, as are datagrams that fail to parse.

use std::io;
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::app::commands::BusCall;
use crate::app::events::CallOutcome;
use crate::app::ports::IpcBus;
use crate::bt::codec::{Request, Response};

/// Default rendezvous path for the bridge socket.
pub const DEFAULT_SOCKET_PATH: &str = "/run/btbridged.sock";

/// Largest datagram accepted from a client.
const MAX_DATAGRAM: usize = 4096;

/// Inbound datagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum ClientMessage {
    /// Start receiving `ReceivedMessage` broadcasts.
    Subscribe,
    Unsubscribe,
    SubmitResponse {
        id: u64,
        seq: u8,
        netfn: u8,
        lun: u8,
        cmd: u8,
        cc: u8,
        #[serde(default)]
        data: Vec<u8>,
    },
    SendAttention {
        id: u64,
    },
}

/// Outbound datagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    Return {
        id: u64,
        result: i64,
    },
    Error {
        id: u64,
        errno: i32,
        name: String,
        message: String,
    },
    ReceivedMessage {
        seq: u8,
        netfn: u8,
        lun: u8,
        cmd: u8,
        data: Vec<u8>,
    },
}

/// Return address of one method call. Deliberately not `Clone`.
#[derive(Debug, PartialEq, Eq)]
pub struct SocketReply {
    peer: PathBuf,
    id: u64,
}

/// Bridge end of the IPC socket.
pub struct SocketBus {
    socket: UnixDatagram,
    path: PathBuf,
    subscribers: Vec<PathBuf>,
}

impl SocketBus {
    /// Bind at `path`, replacing a stale socket left by a previous run.
    pub fn bind(path: &Path) -> io::Result<Self> {
        match std::fs::remove_file(path) {
            Ok(()) => debug!("Removed stale socket {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        let socket = UnixDatagram::bind(path)?;
        socket.set_nonblocking(true)?;
        Ok(Self {
            socket,
            path: path.to_path_buf(),
            subscribers: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn subscribers(&self) -> &[PathBuf] {
        &self.subscribers
    }

    fn handle(&mut self, peer: PathBuf, msg: ClientMessage, calls: &mut Vec<BusCall<SocketReply>>) {
        match msg {
            ClientMessage::Subscribe => {
                if !self.subscribers.contains(&peer) {
                    info!("Subscriber {} added", peer.display());
                    self.subscribers.push(peer);
                }
            }
            ClientMessage::Unsubscribe => {
                self.subscribers.retain(|s| *s != peer);
                info!("Subscriber {} removed", peer.display());
            }
            ClientMessage::SubmitResponse {
                id,
                seq,
                netfn,
                lun,
                cmd,
                cc,
                data,
            } => calls.push(BusCall::SubmitResponse {
                response: Response {
                    netfn,
                    lun,
                    seq,
                    cmd,
                    completion_code: cc,
                    data,
                },
                reply: SocketReply { peer, id },
            }),
            ClientMessage::SendAttention { id } => calls.push(BusCall::SendAttention {
                reply: SocketReply { peer, id },
            }),
        }
    }

    fn send(&self, peer: &Path, msg: &ServerMessage) -> io::Result<()> {
        let bytes = serde_json::to_vec(msg).map_err(io::Error::other)?;
        self.socket.send_to(&bytes, peer).map(drop)
    }
}

impl IpcBus for SocketBus {
    type Reply = SocketReply;

    fn process(&mut self) -> io::Result<Vec<BusCall<SocketReply>>> {
        let mut calls = Vec::new();
        let mut buf = [0u8; MAX_DATAGRAM];
        loop {
            let (n, addr) = match self.socket.recv_from(&mut buf) {
                Ok(r) => r,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            let Some(peer) = addr.as_pathname().map(Path::to_path_buf) else {
                warn!("Ignoring {} byte datagram from unbound client", n);
                continue;
            };
            match serde_json::from_slice::<ClientMessage>(&buf[..n]) {
                Ok(msg) => self.handle(peer, msg, &mut calls),
                Err(e) => warn!("Ignoring bad datagram from {}: {}", peer.display(), e),
            }
        }
        Ok(calls)
    }

    fn emit_received(&mut self, request: &Request) {
        let msg = ServerMessage::ReceivedMessage {
            seq: request.seq,
            netfn: request.netfn,
            lun: request.lun,
            cmd: request.cmd,
            data: request.data.to_vec(),
        };
        let mut gone = Vec::new();
        for peer in &self.subscribers {
            match self.send(peer, &msg) {
                Ok(()) => {}
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused
                    ) =>
                {
                    warn!("Subscriber {} went away: {}", peer.display(), e);
                    gone.push(peer.clone());
                }
                Err(e) => warn!("Failed to emit signal to {}: {}", peer.display(), e),
            }
        }
        self.subscribers.retain(|s| !gone.contains(s));
    }

    fn complete(&mut self, reply: SocketReply, outcome: CallOutcome) {
        let msg = match outcome {
            CallOutcome::Success => ServerMessage::Return {
                id: reply.id,
                result: 0,
            },
            CallOutcome::Failed { errno, reason } => ServerMessage::Error {
                id: reply.id,
                errno: errno as i32,
                name: format!("{errno:?}"),
                message: reason.to_owned(),
            },
        };
        if let Err(e) = self.send(&reply.peer, &msg) {
            warn!("Couldn't send method reply to {}: {}", reply.peer.display(), e);
        }
    }
}

impl AsFd for SocketBus {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.socket.as_fd()
    }
}

impl Drop for SocketBus {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
