// src/motion/controller.rs - Dead-reckoning motion controller for the blind
//!
//! There is no position sensor. The controller integrates elapsed time
//! against the configured speed while the motor runs and clamps the estimate
//! to `[0, height]` after every update; the clamp is the only drift correction.
//!
//! One long-lived task runs [`MotionController::tick`] every few
//! milliseconds (and immediately when a new instruction is recorded). Other
//! tasks talk to it through a [`BlindHandle`] only.

use super::handle::{BlindHandle, InstructionSlot};
use super::instruction::{Command, Instruction};
use super::MotionError;
use crate::clock::Clock;
use crate::config::Config;
use crate::hardware::{IndicatorState, MotorDriver, Peripherals, StatusIndicator};
use crate::position_store::PositionStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const PROGRESS_REPORT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// What the motor is currently doing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Motion {
    Idle,
    Moving { direction: Direction, target: f64 },
}

impl Motion {
    pub fn is_moving(&self) -> bool {
        matches!(self, Motion::Moving { .. })
    }
}

/// Fixed parameters of the control loop.
#[derive(Debug, Clone)]
pub struct MotionSettings {
    pub height: f64,
    pub speed: f64,
    pub raise_duty: u8,
    pub lower_duty: u8,
    pub ramp_duty: u8,
    pub ramp_settle: Duration,
    pub tick_interval: Duration,
    /// Flush interval while moving; `None` flushes only on stop and completion.
    pub persist_interval: Option<Duration>,
}

impl MotionSettings {
    pub fn from_config(config: &Config) -> Self {
        let persist_ms = config.controller.persist_interval_ms;
        Self {
            height: config.blind.height,
            speed: config.blind.speed,
            raise_duty: config.motor.raise_duty,
            lower_duty: config.motor.lower_duty,
            ramp_duty: config.motor.ramp_duty,
            ramp_settle: Duration::from_millis(config.motor.ramp_settle_ms),
            tick_interval: Duration::from_millis(config.controller.tick_interval_ms),
            persist_interval: (persist_ms > 0).then(|| Duration::from_millis(persist_ms)),
        }
    }

    /// Raising the blind takes more power than lowering it.
    fn duty_for(&self, direction: Direction) -> u8 {
        match direction {
            Direction::Up => self.raise_duty,
            Direction::Down => self.lower_duty,
        }
    }
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// The controller's working set.
#[derive(Debug, Clone, PartialEq)]
pub struct BlindState {
    pub extension_length: f64,
    pub height: f64,
    pub speed: f64,
    pub duty_cycle: u8,
}

pub struct MotionController {
    settings: MotionSettings,
    state: BlindState,
    slot: Arc<InstructionSlot>,
    motor: Box<dyn MotorDriver>,
    indicator: Box<dyn StatusIndicator>,
    store: Box<dyn PositionStore>,
    clock: Arc<dyn Clock>,
    last_acted: Instruction,
    motion: Motion,
    checkpoint: Instant,
    /// Steady duty to apply once the start-up surge has settled.
    pending_duty: Option<(Instant, u8)>,
    last_flush: Instant,
    last_report: Instant,
}

impl MotionController {
    /// Restore the last known position from `store` and put the hardware in
    /// its stopped state.
    pub async fn new(
        settings: MotionSettings,
        peripherals: Peripherals,
        mut store: Box<dyn PositionStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, MotionError> {
        let restored = match store.load().await {
            Ok(length) => length,
            Err(e) => {
                tracing::warn!("Could not read blind position, assuming fully up: {}", e);
                0.0
            }
        };

        let slot = Arc::new(InstructionSlot::new(clock.clone()));
        let now = clock.now_monotonic();
        let Peripherals { mut motor, mut indicator } = peripherals;
        let stopped = motor.stop().and_then(|()| indicator.show(IndicatorState::Stopped));
        if let Err(e) = stopped {
            tracing::error!("Failed to bring hardware to a stop: {}", e);
            if let Err(e) = motor.release() {
                tracing::error!("Failed to release motor: {}", e);
            }
            if let Err(e) = indicator.release() {
                tracing::error!("Failed to release indicator: {}", e);
            }
            return Err(e.into());
        }

        let mut controller = Self {
            state: BlindState {
                extension_length: restored,
                height: settings.height,
                speed: settings.speed,
                duty_cycle: 0,
            },
            settings,
            last_acted: slot.current(),
            slot,
            motor,
            indicator,
            store,
            clock,
            motion: Motion::Idle,
            checkpoint: now,
            pending_duty: None,
            last_flush: now,
            last_report: now,
        };
        controller.enforce_limits().await;
        tracing::info!(
            "Motion controller ready: length {} of {}, speed {}/s",
            controller.state.extension_length,
            controller.state.height,
            controller.state.speed
        );
        Ok(controller)
    }

    pub fn handle(&self) -> BlindHandle {
        BlindHandle::new(self.slot.clone())
    }

    pub fn state(&self) -> &BlindState {
        &self.state
    }

    pub fn extension_length(&self) -> f64 {
        self.state.extension_length
    }

    pub fn motion(&self) -> Motion {
        self.motion
    }

    /// One control loop iteration.
    pub async fn tick(&mut self) -> Result<(), MotionError> {
        let now = self.clock.now_monotonic();
        let current = self.slot.current();

        if !current.same_issue(&self.last_acted) {
            tracing::info!(
                "New instruction '{}' at length {:.2}, issued {:?} ago",
                current.command,
                self.state.extension_length,
                now.saturating_duration_since(current.issued_at)
            );
            // account for the distance covered under the previous instruction
            if self.motion.is_moving() {
                self.integrate(now).await;
                self.persist().await;
            }
            self.checkpoint = now;
            self.act_on(current, now).await?;
        }

        self.settle_duty(now)?;

        let Motion::Moving { direction, target } = self.motion else {
            self.checkpoint = now;
            return Ok(());
        };

        self.integrate(now).await;
        self.report_progress(now);

        if self.goal_reached(direction, target) {
            tracing::info!("Done: blind extension length {:.2}", self.state.extension_length);
            self.finish_motion().await?;
        } else if self
            .settings
            .persist_interval
            .is_some_and(|interval| now.saturating_duration_since(self.last_flush) >= interval)
        {
            self.persist().await;
        }
        Ok(())
    }

    async fn act_on(&mut self, instruction: Instruction, now: Instant) -> Result<(), MotionError> {
        let length = self.state.extension_length;
        match instruction.command {
            Command::Stop => {
                self.last_acted = instruction;
                self.halt()?;
            }
            Command::MoveFullUp => {
                self.last_acted = instruction;
                if length <= 0.0 {
                    tracing::info!("Blind is already fully up ({})", length);
                    self.finish_motion().await?;
                } else {
                    self.begin(Direction::Up, 0.0, true, now)?;
                }
            }
            Command::MoveFullDown => {
                self.last_acted = instruction;
                if length >= self.settings.height {
                    tracing::info!("Blind is already fully down ({})", length);
                    self.finish_motion().await?;
                } else {
                    self.begin(Direction::Down, self.settings.height, true, now)?;
                }
            }
            Command::MoveToLength(target) if !target.is_finite() => {
                tracing::warn!("'{}' is not a valid target length, ignoring it", target);
                self.restore_previous(instruction);
            }
            Command::MoveToLength(target) => {
                self.last_acted = instruction;
                let direction = if target < length { Direction::Up } else { Direction::Down };
                tracing::info!("Moving {:?} from {:.2} to {}", direction, length, target);
                self.begin(direction, target, false, now)?;
            }
        }
        Ok(())
    }

    /// Undo a rejected instruction: the previous command goes back in the slot
    /// and the motor keeps doing what it was doing.
    fn restore_previous(&mut self, rejected: Instruction) {
        match self.slot.replace_if_current(&rejected, self.last_acted.command) {
            Some(restored) => self.last_acted = restored,
            // a newer instruction already replaced it; handle that next tick
            None => self.last_acted = rejected,
        }
    }

    fn begin(&mut self, direction: Direction, target: f64, ramp: bool, now: Instant) -> Result<(), MotionError> {
        let duty = self.settings.duty_for(direction);
        self.motor.set_direction(direction == Direction::Up)?;
        if ramp && !self.settings.ramp_settle.is_zero() {
            // get the motor turning, then settle on the steady duty
            self.motor.set_power(self.settings.ramp_duty)?;
            self.state.duty_cycle = self.settings.ramp_duty;
            self.pending_duty = Some((now + self.settings.ramp_settle, duty));
        } else {
            self.motor.set_power(duty)?;
            self.state.duty_cycle = duty;
            self.pending_duty = None;
        }
        self.indicator.show(match direction {
            Direction::Up => IndicatorState::Up,
            Direction::Down => IndicatorState::Down,
        })?;
        self.motion = Motion::Moving { direction, target };
        Ok(())
    }

    fn settle_duty(&mut self, now: Instant) -> Result<(), MotionError> {
        if let Some((at, duty)) = self.pending_duty {
            if now >= at {
                self.pending_duty = None;
                self.motor.set_power(duty)?;
                self.state.duty_cycle = duty;
            }
        }
        Ok(())
    }

    fn halt(&mut self) -> Result<(), MotionError> {
        self.pending_duty = None;
        self.motion = Motion::Idle;
        self.motor.stop()?;
        self.state.duty_cycle = 0;
        self.indicator.show(IndicatorState::Stopped)?;
        Ok(())
    }

    /// Stop, flush, and put `Stop` back in the slot so clients see the motion
    /// as finished.
    async fn finish_motion(&mut self) -> Result<(), MotionError> {
        self.halt()?;
        self.persist().await;
        if let Some(stop) = self.slot.replace_if_current(&self.last_acted, Command::Stop) {
            self.last_acted = stop;
        }
        Ok(())
    }

    fn goal_reached(&self, direction: Direction, target: f64) -> bool {
        let length = self.state.extension_length;
        match direction {
            Direction::Up => length <= target || length <= 0.0,
            Direction::Down => length >= target || length >= self.settings.height,
        }
    }

    /// Advance the estimate by the time since the checkpoint.
    async fn integrate(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.checkpoint).as_secs_f64();
        self.checkpoint = now;
        let travelled = elapsed * self.settings.speed;
        match self.motion {
            Motion::Moving { direction: Direction::Up, .. } => self.state.extension_length -= travelled,
            Motion::Moving { direction: Direction::Down, .. } => self.state.extension_length += travelled,
            Motion::Idle => return,
        }
        self.enforce_limits().await;
    }

    /// Clamp to `[0, height]`; an overrun is flushed right away.
    async fn enforce_limits(&mut self) {
        let length = self.state.extension_length;
        let clamped = length.clamp(0.0, self.settings.height);
        if clamped != length {
            if length < 0.0 {
                tracing::warn!("Under-run: estimated length {:.3}, clamping to 0", length);
            } else {
                tracing::warn!("Over-run: estimated length {:.3}, clamping to {}", length, clamped);
            }
            self.state.extension_length = clamped;
            self.persist().await;
        }
    }

    async fn persist(&mut self) {
        self.last_flush = self.clock.now_monotonic();
        if let Err(e) = self.store.save(self.state.extension_length).await {
            tracing::warn!("Failed to persist blind position: {}", e);
        }
    }

    fn report_progress(&mut self, now: Instant) {
        if now.saturating_duration_since(self.last_report) >= PROGRESS_REPORT_INTERVAL {
            tracing::debug!(
                "Length {:.2}, duty {}%",
                self.state.extension_length,
                self.state.duty_cycle
            );
            self.last_report = now;
        }
    }

    /// Flush the final position and hand the hardware back. Runs once, on
    /// every exit path of the control loop.
    async fn cleanup(&mut self) {
        tracing::info!("Motion controller cleanup");
        let now = self.clock.now_monotonic();
        self.integrate(now).await;
        self.motion = Motion::Idle;
        self.pending_duty = None;
        self.persist().await;

        self.state.duty_cycle = 0;
        if let Err(e) = self.motor.stop() {
            tracing::error!("Failed to stop motor: {}", e);
        }
        if let Err(e) = self.motor.release() {
            tracing::error!("Failed to release motor: {}", e);
        }
        if let Err(e) = self.indicator.clear() {
            tracing::error!("Failed to reset indicator: {}", e);
        }
        if let Err(e) = self.indicator.release() {
            tracing::error!("Failed to release indicator: {}", e);
        }
        tracing::info!("Motion controller cleanup complete");
    }

    /// Run the control loop on its own task.
    pub fn start(mut self) -> ControllerTask {
        let handle = self.handle();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let mut changes = self.slot.subscribe();

        let join = tokio::spawn(async move {
            tracing::info!("Motion control loop running");
            let mut interval = tokio::time::interval(self.settings.tick_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            let result = loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        tracing::info!("Motion control loop shutting down");
                        break Ok(());
                    }
                    _ = interval.tick() => {}
                    _ = changes.changed() => {}
                }
                if let Err(e) = self.tick().await {
                    tracing::error!("Motion control loop failed: {}", e);
                    break Err(e);
                }
            };
            self.cleanup().await;
            result
        });

        ControllerTask {
            handle,
            shutdown: Some(shutdown_tx),
            join: Some(join),
        }
    }
}

/// A running control loop.
pub struct ControllerTask {
    handle: BlindHandle,
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<Result<(), MotionError>>>,
}

impl ControllerTask {
    pub fn handle(&self) -> BlindHandle {
        self.handle.clone()
    }

    /// Resolves when the loop exits on its own, e.g. after a hardware fault.
    /// Cancel-safe; resolves immediately once the loop has been reaped.
    pub async fn wait(&mut self) -> Result<(), MotionError> {
        let Some(join) = self.join.as_mut() else {
            return Ok(());
        };
        let outcome = join.await;
        self.join = None;
        outcome.map_err(|e| MotionError::Task(e.to_string()))?
    }

    /// Ask the loop to stop and wait for its cleanup to finish.
    pub async fn shutdown(mut self) -> Result<(), MotionError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.wait().await
    }
}
