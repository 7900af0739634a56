//! tidebridge - the command bridge between a community website and its
//! game server.
//!
//! The bridge accepts privileged commands from authenticated web staff,
//! stores them in a durable FIFO queue, and notifies the game-server
//! consumer over a WebSocket channel. It also runs the code-based account
//! pairing flow that associates web accounts with game and chat accounts.

pub mod channel;
pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod identity;
pub mod metrics;
pub mod policy;
pub mod security;
