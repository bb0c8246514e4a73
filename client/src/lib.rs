//! # Farm Console Client Library
//!
//! A small line-based client for the farm server, used for manual testing and
//! by the integration tests. It speaks the same JSON-lines protocol as any
//! other front end: one request object per line, one state or error object per
//! line back.
//!
//! ## Module Organization
//!
//! ### Commands Module (`commands`)
//! Turns typed text such as `plant 0 1` or `view <id>` into protocol requests
//! and renders server state for a terminal.
//!
//! ### Network Module (`network`)
//! Owns the TCP connection: login, sending requests, reading pushes, and the
//! interactive loop that multiplexes stdin with server messages.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//! use shared::ClientMessage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::connect("127.0.0.1:5050").await?;
//!     let id = client.login(None).await?;
//!     println!("playing as {}", id);
//!
//!     client.send(&ClientMessage::Plant { row: 0, col: 0 }).await?;
//!     while let Some(message) = client.recv().await? {
//!         print!("{}", client::commands::render(&message));
//!     }
//!     Ok(())
//! }
//! ```

pub mod commands;
pub mod network;
