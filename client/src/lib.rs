//! # Slime Soccer Client Library
//!
//! Client for the slime soccer server. The server is authoritative for every
//! position, score and phase change; the client keeps a replica of its world
//! and presents it so that the local slime responds without a round trip.
//!
//! ## Architecture Overview
//!
//! ### State Replica
//! The first `FullState` after joining seeds the replica. Every later tick
//! arrives as a revisioned patch. A patch whose base revision does not match
//! the local one is discarded and a full state is requested instead.
//!
//! ### Client-Side Prediction
//! While a match is running the local slime is advanced every frame from the
//! held keys using the same kinematics the server runs. Predicted positions
//! are not corrected against the server except after a goal reset.
//!
//! ### Interpolation
//! Remote slimes and the ball ease a fixed fraction of the remaining distance
//! toward their latest authoritative position each frame.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! Replica management, prediction and smoothing. Free of any window or
//! socket dependency.
//!
//! ### Input Module (`input`)
//! Keyboard sampling, change detection and debug toggles.
//!
//! ### Network Module (`network`)
//! UDP transport on a background thread with optional artificial latency,
//! and the frame loop tying the other modules together.
//!
//! ### Rendering Module (`rendering`)
//! Field, slimes, ball, scores, banners and debug overlays.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//!
//! #[macroquad::main("Slime Soccer")]
//! async fn main() {
//!     let client = Client::new("127.0.0.1:8080", None, 0, 1280, 720).unwrap();
//!     client.run().await.unwrap();
//! }
//! ```

pub mod game;
pub mod input;
pub mod network;
pub mod rendering;
