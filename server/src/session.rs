//! Per-connection session lifecycle
//!
//! Each connection goes `Connecting -> AwaitingLogin -> Active -> Closed`. The
//! first line must be a login; anything else closes the connection before any
//! farm or session is created. Once active the worker waits on two events:
//! an inbound line (dispatched as exactly one command) and its session signal
//! (the ticker or another session flagged this one dirty). Every wake-up that
//! finds the dirty flag set pushes the full state of the farm currently viewed.

use crate::error::{ActionError, SessionError};
use crate::viewers::SessionId;
use crate::world::{Login, World};
use log::{debug, info, warn};
use shared::{decode_line, encode_line, ClientMessage, ServerMessage};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Connecting,
    AwaitingLogin,
    Active,
    Closed,
}

/// What the active loop does after a command
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct Session<R, W> {
    world: Arc<World>,
    peer: String,
    lines: Lines<BufReader<R>>,
    writer: W,
    phase: SessionPhase,
    /// Message carried by every state push until the next command replaces it
    last_msg: String,
}

impl<R, W> Session<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(world: Arc<World>, peer: impl Into<String>, reader: R, writer: W) -> Self {
        Self {
            world,
            peer: peer.into(),
            lines: BufReader::new(reader).lines(),
            writer,
            phase: SessionPhase::Connecting,
            last_msg: "welcome".to_string(),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Drives the connection to completion
    ///
    /// `Ok` means the client quit or the session was superseded by a reconnect.
    /// Whatever happens after login, the session is unregistered before returning.
    pub async fn run(mut self) -> Result<(), SessionError> {
        self.phase = SessionPhase::AwaitingLogin;
        let login = match self.handshake().await {
            Ok(login) => login,
            Err(e) => {
                self.phase = SessionPhase::Closed;
                return Err(e);
            }
        };

        self.phase = SessionPhase::Active;
        let result = self.active_loop(&login).await;

        self.phase = SessionPhase::Closed;
        self.world.logout(login.session_id).await;
        let _ = self.writer.shutdown().await;

        match &result {
            Ok(()) => info!("Session {} ({}) closed", login.session_id, self.peer),
            Err(e) => info!("Session {} ({}) ended: {}", login.session_id, self.peer, e),
        }
        result
    }

    async fn handshake(&mut self) -> Result<Login, SessionError> {
        let line = self
            .lines
            .next_line()
            .await?
            .ok_or(SessionError::Disconnected)?;

        match decode_line::<ClientMessage>(&line) {
            Ok(ClientMessage::Login { id }) => Ok(self.world.login(id.as_deref()).await),
            Ok(other) => {
                let reason = format!("expected login, got {}", other.op());
                self.reject(&reason).await;
                Err(SessionError::Handshake(reason))
            }
            Err(e) => {
                let reason = format!("expected login, got unparseable line: {}", e);
                self.reject(&reason).await;
                Err(SessionError::Handshake(reason))
            }
        }
    }

    /// Best-effort notice before a handshake failure drops the connection
    async fn reject(&mut self, reason: &str) {
        warn!("Rejecting connection {}: {}", self.peer, reason);
        let _ = self.send_error(reason).await;
        let _ = self.writer.shutdown().await;
    }

    async fn active_loop(&mut self, login: &Login) -> Result<(), SessionError> {
        let signal = Arc::clone(&login.signal);

        loop {
            if signal.is_closed() {
                info!(
                    "Session {} for {} was superseded, closing {}",
                    login.session_id, login.player_id, self.peer
                );
                return Ok(());
            }

            if signal.take_dirty() {
                self.push_state(login.session_id).await?;
            }

            tokio::select! {
                line = self.lines.next_line() => {
                    let line = line?.ok_or(SessionError::Disconnected)?;
                    if self.dispatch(login, &line).await? == Flow::Quit {
                        return Ok(());
                    }
                }
                _ = signal.notified() => {}
            }
        }
    }

    /// Handles exactly one inbound line; command failures are reported, not fatal
    async fn dispatch(&mut self, login: &Login, line: &str) -> Result<Flow, SessionError> {
        if line.trim().is_empty() {
            return Ok(Flow::Continue);
        }

        let message = match decode_line::<ClientMessage>(line) {
            Ok(message) => message,
            Err(e) => {
                warn!("Bad request from {}: {}", self.peer, e);
                self.send_error(&format!("unknown op: {}", e)).await?;
                return Ok(Flow::Continue);
            }
        };

        let session = login.session_id;
        let outcome = match message {
            ClientMessage::Plant { row, col } => self
                .world
                .plant(session, row, col)
                .await
                .map(|()| format!("planted at ({}, {})", row, col)),
            ClientMessage::Harvest { row, col } => self
                .world
                .harvest(session, row, col)
                .await
                .map(|_| format!("harvest at ({}, {})", row, col)),
            ClientMessage::Steal { row, col } => self
                .world
                .steal(session, row, col)
                .await
                .map(|amount| format!("stole {} at ({}, {})", amount, row, col)),
            ClientMessage::View { target } => self
                .world
                .set_view(session, &target)
                .await
                .map(|_| format!("viewing {}", target)),
            ClientMessage::Quit => {
                debug!("Session {} requested quit", session);
                return Ok(Flow::Quit);
            }
            ClientMessage::Login { .. } => {
                self.send_error("already logged in").await?;
                return Ok(Flow::Continue);
            }
        };

        match outcome {
            Ok(msg) => {
                self.last_msg = msg;
                login.signal.mark_dirty();
            }
            Err(ActionError::SessionClosed) => {
                debug!("Session {} dropped a command after being closed", session);
            }
            Err(e) => self.send_error(&e.to_string()).await?,
        }
        Ok(Flow::Continue)
    }

    async fn push_state(&mut self, session: SessionId) -> Result<(), SessionError> {
        match self.world.state_for(session, &self.last_msg).await {
            Some(state) => self.send(&state).await,
            // Unregistered by a reconnect; the closed flag ends the loop next iteration
            None => Ok(()),
        }
    }

    async fn send_error(&mut self, msg: &str) -> Result<(), SessionError> {
        self.send(&ServerMessage::Error {
            msg: msg.to_string(),
        })
        .await
    }

    async fn send(&mut self, message: &ServerMessage) -> Result<(), SessionError> {
        let line = encode_line(message)?;
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }
}
