// src/motion/mod.rs - Blind motion: instructions, the shared handle and the control loop
pub mod controller;
pub mod handle;
pub mod instruction;

pub use controller::{BlindState, ControllerTask, Direction, Motion, MotionController, MotionSettings};
pub use handle::BlindHandle;
pub use instruction::{Command, Instruction, ParseCommandError};

use crate::hardware::HardwareError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MotionError {
    #[error("Hardware error: {0}")]
    Hardware(#[from] HardwareError),
    #[error("Control loop task failed: {0}")]
    Task(String),
}
