//! Server network layer: TCP accept loop and task wiring

use crate::farm::GameRules;
use crate::session::Session;
use crate::ticker::{GrowthTicker, DEFAULT_TICK_PERIOD};
use crate::world::World;
use log::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

/// Settings consumed by [`Server::bind`]
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    pub tick_period: Duration,
    pub rules: GameRules,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: format!("127.0.0.1:{}", shared::DEFAULT_PORT),
            tick_period: DEFAULT_TICK_PERIOD,
            rules: GameRules::default(),
        }
    }
}

/// Owns the listener and the shared world for the lifetime of the process
pub struct Server {
    listener: TcpListener,
    world: Arc<World>,
    tick_period: Duration,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(&config.addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            world: Arc::new(World::new(config.rules)),
            tick_period: config.tick_period,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn world(&self) -> Arc<World> {
        Arc::clone(&self.world)
    }

    /// Spawns a worker for one accepted connection
    fn spawn_session(&self, stream: TcpStream, addr: SocketAddr) {
        let world = Arc::clone(&self.world);

        tokio::spawn(async move {
            if let Err(e) = stream.set_nodelay(true) {
                error!("Failed to set TCP_NODELAY for {}: {}", addr, e);
            }
            let (reader, writer) = stream.into_split();
            let session = Session::new(world, addr.to_string(), reader, writer);
            // Teardown already happened inside run; the error is only informative
            let _ = session.run().await;
        });
    }

    /// Starts the growth ticker and accepts connections until the listener fails
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let ticker = GrowthTicker::new(Arc::clone(&self.world), self.tick_period).spawn();
        info!("Server started successfully");

        let result: std::io::Result<()> = loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    info!("New connection from {}", addr);
                    self.spawn_session(stream, addr);
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    if is_fatal_accept_error(&e) {
                        break Err(e);
                    }
                }
            }
        };

        ticker.abort();
        result.map_err(Into::into)
    }
}

/// Per-connection failures (a peer resetting mid-handshake) must not stop the accept loop
fn is_fatal_accept_error(e: &std::io::Error) -> bool {
    !matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::Interrupted
            | std::io::ErrorKind::WouldBlock
    )
}
