//! # Slime Soccer Server Library
//!
//! Authoritative server for two-player slime soccer. The server owns every
//! match's world state, runs the physics, decides goals and winners, and
//! streams state deltas to the connected clients.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The per-tick simulation: player and ball integration, player/ball contact,
//! goal detection, scoring and velocity clamping. Pure functions over a
//! [`shared::WorldState`].
//!
//! ### Session Module (`session`)
//! Match lifecycle for one world: admission, the `Waiting -> Playing ->
//! GameOver` phase machine, input buffering and departure handling.
//!
//! ### Sync Module (`sync`)
//! Diffs the world after every flush and produces revisioned patches, or a
//! full state for connections that just joined or fell out of sync.
//!
//! ### Room Module (`room`)
//! Couples a session with its sync state and member list, and a registry
//! that places new connections into rooms.
//!
//! ### Client Manager Module (`client_manager`)
//! Maps UDP peers to random session ids and detects silent connections.
//!
//! ### Network Module (`network`)
//! UDP socket handling and the main loop that interleaves inbound packets
//! with the fixed-rate room tick.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new("127.0.0.1:8080", ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! The main loop runs alongside three background tasks:
//! - **Network Receiver**: decodes datagrams into packets
//! - **Network Sender**: drains the outbound queue so ticks never wait on sockets
//! - **Timeout Checker**: reports connections that went silent

pub mod client_manager;
pub mod game;
pub mod network;
pub mod room;
pub mod session;
pub mod sync;
