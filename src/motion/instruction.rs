// src/motion/instruction.rs - Commands accepted by the motion controller
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use thiserror::Error;

/// What the blind has been asked to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Stop,
    MoveFullUp,
    MoveFullDown,
    /// Absolute target extension length.
    MoveToLength(f64),
}

/// Canonical wire form: `up`, `down`, `stop` or the target as a number.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Stop => f.write_str("stop"),
            Command::MoveFullUp => f.write_str("up"),
            Command::MoveFullDown => f.write_str("down"),
            Command::MoveToLength(target) => write!(f, "{}", target),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is neither up, down, stop nor a number")]
pub struct ParseCommandError(pub String);

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Command::MoveFullUp),
            "down" => Ok(Command::MoveFullDown),
            "stop" => Ok(Command::Stop),
            other => other
                .parse::<f64>()
                .map(Command::MoveToLength)
                .map_err(|_| ParseCommandError(other.to_string())),
        }
    }
}

/// A command as recorded by the controller.
///
/// `issue` increases with every recorded instruction and is what the control
/// loop uses to tell a new instruction from one it already acted on; `command`
/// equality is what clients compare against.
#[derive(Debug, Clone, Copy)]
pub struct Instruction {
    pub command: Command,
    pub issued_at: Instant,
    pub issue: u64,
}

impl Instruction {
    pub fn same_issue(&self, other: &Instruction) -> bool {
        self.issue == other.issue
    }
}
