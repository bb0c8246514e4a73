use crate::commands::{self, Command};
use log::{info, warn};
use shared::{decode_line, encode_line, ClientMessage, PlayerId, ServerMessage};
use std::collections::BTreeMap;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("server closed the connection")]
    Closed,
    #[error("server refused: {0}")]
    Rejected(String),
}

/// A line-protocol connection to the farm server
pub struct Client {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    client_id: Option<PlayerId>,
    players: BTreeMap<PlayerId, PlayerId>,
}

impl Client {
    pub async fn connect(server_addr: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(server_addr).await?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();

        Ok(Client {
            lines: BufReader::new(reader).lines(),
            writer,
            client_id: None,
            players: BTreeMap::new(),
        })
    }

    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }

    /// Last roster seen: every player mapped to the farm they are viewing
    pub fn players(&self) -> &BTreeMap<PlayerId, PlayerId> {
        &self.players
    }

    pub async fn send(&mut self, message: &ClientMessage) -> Result<(), ClientError> {
        let line = encode_line(message)?;
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Reads the next server message, `None` once the server hangs up
    pub async fn recv(&mut self) -> Result<Option<ServerMessage>, ClientError> {
        let Some(line) = self.lines.next_line().await? else {
            return Ok(None);
        };
        let message: ServerMessage = decode_line(&line)?;
        if let ServerMessage::State {
            client_id, players, ..
        } = &message
        {
            self.client_id = Some(client_id.clone());
            self.players = players.clone();
        }
        Ok(Some(message))
    }

    /// Logs in, reattaching to `id` when given, and returns the assigned player id
    pub async fn login(&mut self, id: Option<String>) -> Result<PlayerId, ClientError> {
        self.send(&ClientMessage::Login { id }).await?;

        match self.recv().await? {
            Some(ServerMessage::State { client_id, .. }) => {
                info!("Logged in as {}", client_id);
                Ok(client_id)
            }
            Some(ServerMessage::Error { msg }) => Err(ClientError::Rejected(msg)),
            None => Err(ClientError::Closed),
        }
    }

    /// Interactive loop: typed commands go to the server, server lines are printed
    pub async fn run(&mut self) -> Result<(), ClientError> {
        let mut stdin = BufReader::new(tokio::io::stdin()).lines();
        println!("{}", commands::HELP);

        loop {
            tokio::select! {
                input = stdin.next_line() => {
                    let Some(input) = input? else {
                        self.send(&ClientMessage::Quit).await?;
                        return Ok(());
                    };
                    if input.trim().is_empty() {
                        continue;
                    }
                    match commands::parse_command(&input) {
                        Ok(Command::Send(ClientMessage::Quit)) => {
                            self.send(&ClientMessage::Quit).await?;
                            return Ok(());
                        }
                        Ok(Command::Send(message)) => self.send(&message).await?,
                        Ok(Command::ShowPlayers) => {
                            for (player, viewing) in &self.players {
                                println!("  {} -> {}", player, viewing);
                            }
                        }
                        Ok(Command::Help) => println!("{}", commands::HELP),
                        Err(e) => println!("{}", e),
                    }
                }
                message = self.recv() => {
                    match message {
                        Ok(Some(message)) => print!("{}", commands::render(&message)),
                        Ok(None) => {
                            println!("Connection closed.");
                            return Ok(());
                        }
                        Err(ClientError::Json(e)) => warn!("Ignoring malformed server line: {}", e),
                        Err(e) => return Err(e),
                    }
                }
            }
        }
    }
}
