// src/motion/handle.rs - The one piece of state shared between connections and the control loop
use super::instruction::{Command, Instruction};
use crate::clock::Clock;
use std::sync::Arc;
use tokio::sync::watch;

/// Holds the current instruction. Every read-modify happens inside a single
/// `watch` update, so readers never see a half-written instruction and a
/// check-then-write cannot interleave with another writer.
pub(crate) struct InstructionSlot {
    tx: watch::Sender<Instruction>,
    clock: Arc<dyn Clock>,
}

impl InstructionSlot {
    pub(crate) fn new(clock: Arc<dyn Clock>) -> Self {
        let initial = Instruction {
            command: Command::Stop,
            issued_at: clock.now_monotonic(),
            issue: 0,
        };
        let (tx, _rx) = watch::channel(initial);
        Self { tx, clock }
    }

    pub(crate) fn current(&self) -> Instruction {
        *self.tx.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Instruction> {
        self.tx.subscribe()
    }

    fn next(&self, previous: &Instruction, command: Command) -> Instruction {
        Instruction {
            command,
            issued_at: self.clock.now_monotonic(),
            issue: previous.issue + 1,
        }
    }

    pub(crate) fn record(&self, command: Command) -> Instruction {
        let mut recorded = None;
        self.tx.send_modify(|current| {
            *current = self.next(current, command);
            recorded = Some(*current);
        });
        recorded.unwrap_or_else(|| self.current())
    }

    /// Record `command` unless it is already the current command.
    pub(crate) fn record_if_changed(&self, command: Command) -> Option<Instruction> {
        let mut recorded = None;
        self.tx.send_if_modified(|current| {
            if current.command == command {
                return false;
            }
            *current = self.next(current, command);
            recorded = Some(*current);
            true
        });
        recorded
    }

    /// Replace the instruction with `command` only if `expected` is still the
    /// current one. Used by the control loop so it never overwrites an
    /// instruction that arrived after the one it finished with.
    pub(crate) fn replace_if_current(&self, expected: &Instruction, command: Command) -> Option<Instruction> {
        let mut recorded = None;
        self.tx.send_if_modified(|current| {
            if !current.same_issue(expected) {
                return false;
            }
            *current = self.next(current, command);
            recorded = Some(*current);
            true
        });
        recorded
    }
}

/// Cheap, cloneable access to a motion controller from other tasks.
#[derive(Clone)]
pub struct BlindHandle {
    slot: Arc<InstructionSlot>,
}

impl BlindHandle {
    pub(crate) fn new(slot: Arc<InstructionSlot>) -> Self {
        Self { slot }
    }

    /// Record a new instruction. Never blocks and never validates; the control
    /// loop acts on it (or rejects it) on its next iteration.
    pub fn instruct(&self, command: Command) -> Instruction {
        let instruction = self.slot.record(command);
        tracing::info!("Instruction recorded: {} (#{})", instruction.command, instruction.issue);
        instruction
    }

    /// Like [`instruct`](Self::instruct), but a no-op returning `None` when the
    /// controller is already doing `command`.
    pub fn instruct_if_changed(&self, command: Command) -> Option<Instruction> {
        let instruction = self.slot.record_if_changed(command)?;
        tracing::info!("Instruction recorded: {} (#{})", instruction.command, instruction.issue);
        Some(instruction)
    }

    pub fn current_instruction(&self) -> Instruction {
        self.slot.current()
    }

    /// `up`, `down`, `stop` or the numeric target as text.
    pub fn current_instruction_value(&self) -> String {
        self.slot.current().command.to_string()
    }
}
