//! # Farm Server Library
//!
//! This library provides the authoritative server for the multiplayer farm game.
//! Every connected player owns a farm, a 4x4 grid of plots that grow crops over
//! time, and may visit other farms to steal yield from owners who are away.
//!
//! ## Core Responsibilities
//!
//! ### Farm State
//! Each farm keeps its own grid and coin balance behind its own lock. Planting,
//! harvesting, stealing and growth on one farm are linearized; different farms
//! never contend with each other.
//!
//! ### Sessions and Reconnection
//! Farms are created on first login and never deleted. A player reconnecting
//! with their id gets the same board and balance back. A still-open connection
//! for the same id is closed when the new one logs in.
//!
//! ### Targeted Pushes
//! The server remembers which farm every session is viewing. When a farm
//! changes, only the sessions viewing it are flagged dirty and receive a fresh
//! state push.
//!
//! ## Architecture Design
//!
//! ### One Worker per Connection
//! Each TCP connection runs its own async task. The task sleeps until either a
//! request line arrives or its session signal is raised, so idle connections
//! cost nothing.
//!
//! ### Growth Ticker
//! A single periodic task advances crop timers on every farm and notifies the
//! viewers of the farms that changed. It never writes to a socket itself.
//!
//! ### Shared World
//! All registries (farms, viewer sets, live sessions) live in one [`world::World`]
//! built at startup and shared by `Arc`. Login, view switching and logout each
//! run as a single atomic step under its write lock.
//!
//! ## Module Organization
//!
//! - `farm`: per-player grid, coin balance, growth and steal rules
//! - `store`: owner id to farm registry, login and reconnect resolution
//! - `viewers`: who is watching whom, session dirty signals
//! - `world`: the shared registries and the atomic operations across them
//! - `ticker`: periodic growth driver
//! - `session`: per-connection state machine and command dispatch
//! - `network`: TCP listener and task wiring
//! - `error`: typed errors for actions and connections
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!
//!     // Runs the growth ticker and accepts clients until the listener fails
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod farm;
pub mod network;
pub mod session;
pub mod store;
pub mod ticker;
pub mod viewers;
pub mod world;
