// src/lib.rs - Motorized blind controller
//!
//! A dead-reckoning position estimator driving a DC motor through an H-bridge,
//! fed by a tiny one-request-per-connection TCP protocol.

pub mod client;
pub mod clock;
pub mod config;
pub mod hardware;
pub mod motion;
pub mod position_store;
pub mod server;

pub use clock::{Clock, ManualClock, StdClock};
pub use config::{load_config, Config};
pub use motion::{BlindHandle, Command, ControllerTask, MotionController, MotionError, MotionSettings};
pub use position_store::{FilePositionStore, PositionStore};
pub use server::CommandServer;
