//! Request/reply command channel.
//!
//! Clients address a module by name; the host side receives the routed
//! request and must answer it exactly once. The reply travels over a
//! per-request channel, so concurrent clients never see each other's
//! replies.

use gatehouse_core::{Error, Result};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// A multipart command message. Frame one is the verb.
pub type Frames = Vec<String>;

/// One in-flight command, carrying its private reply channel.
#[derive(Debug)]
pub struct Request {
    frames: Frames,
    reply: Sender<Frames>,
}

impl Request {
    /// The request's frames. Frame one is the verb.
    pub fn frames(&self) -> &[String] {
        &self.frames
    }

    /// Send the reply, consuming the request so it can be answered at
    /// most once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] if the requesting client has gone
    /// away.
    pub fn reply(self, frames: Frames) -> Result<()> {
        self.reply.send(frames).map_err(|_| Error::ChannelClosed)
    }
}

/// A request together with the module name it is addressed to.
#[derive(Debug)]
pub struct Routed {
    /// Target module name.
    pub module: String,
    /// The request to answer.
    pub request: Request,
}

/// Client half of a command channel. Cheap to clone; every clone feeds
/// the same server.
#[derive(Clone)]
pub struct CommandClient {
    tx: Sender<Routed>,
}

impl CommandClient {
    /// Send a command to the named module and block until its reply.
    ///
    /// There is deliberately no timeout here: a hung module hangs its
    /// callers, which is surfaced by logging on the host side rather
    /// than masked with a default reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] if the host has shut down before
    /// replying.
    pub fn request(&self, module: impl Into<String>, frames: Frames) -> Result<Frames> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.tx
            .send(Routed {
                module: module.into(),
                request: Request {
                    frames,
                    reply: reply_tx,
                },
            })
            .map_err(|_| Error::ChannelClosed)?;
        reply_rx.recv().map_err(|_| Error::ChannelClosed)
    }
}

/// Server half of a command channel, owned by a [`ModuleHost`].
///
/// [`ModuleHost`]: crate::ModuleHost
pub struct CommandServer {
    rx: Receiver<Routed>,
}

impl CommandServer {
    /// Block until the next routed request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] once every client has been
    /// dropped.
    pub fn recv(&self) -> Result<Routed> {
        self.rx.recv().map_err(|_| Error::ChannelClosed)
    }

    /// Wait up to `timeout` for the next routed request.
    ///
    /// Returns `Ok(None)` on timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] once every client has been
    /// dropped.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Routed>> {
        match self.rx.recv_timeout(timeout) {
            Ok(routed) => Ok(Some(routed)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(Error::ChannelClosed),
        }
    }
}

/// Create a connected client/server pair.
pub fn command_channel() -> (CommandClient, CommandServer) {
    let (tx, rx) = mpsc::channel();
    (CommandClient { tx }, CommandServer { rx })
}
