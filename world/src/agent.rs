//! Per-agent movement, recording playback and replay validation.

use std::time::Duration;

use chrono_tiles_core::{
    AgentColor, AgentSnapshot, AgentState, Event, GridCoordinates, Motion, RecordState,
    RecordedAction, Recording, ReplayFault,
};
use tracing::{debug, warn};

use crate::{grid::TileGrid, WorldError};

/// Shortest duration a single tile step may take.
pub(crate) const MIN_STEP_DURATION: Duration = Duration::from_millis(1);

#[derive(Clone, Copy, Debug, PartialEq)]
struct Step {
    from: GridCoordinates,
    to: GridCoordinates,
    elapsed: Duration,
}

impl Step {
    fn new(from: GridCoordinates, to: GridCoordinates) -> Self {
        Self {
            from,
            to,
            elapsed: Duration::ZERO,
        }
    }

    fn progress(&self, step_duration: Duration) -> f32 {
        (self.elapsed.as_secs_f32() / step_duration.as_secs_f32()).min(1.0)
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct ReplayCursor {
    index: usize,
    idle: Duration,
    action_checked: bool,
    action_completed: bool,
    halted: bool,
}

/// One colored puzzle agent.
#[derive(Debug)]
pub(crate) struct PuzzleAgent {
    color: AgentColor,
    spawn: GridCoordinates,
    position: GridCoordinates,
    state: AgentState,
    record_state: RecordState,
    reached_destination: bool,
    step_duration: Duration,
    step: Option<Step>,
    recording: Option<Recording>,
    cursor: ReplayCursor,
}

impl PuzzleAgent {
    pub(crate) fn new(color: AgentColor, spawn: GridCoordinates, step_duration: Duration) -> Self {
        Self {
            color,
            spawn,
            position: spawn,
            state: AgentState::Inactive,
            record_state: RecordState::None,
            reached_destination: true,
            step_duration: step_duration.max(MIN_STEP_DURATION),
            step: None,
            recording: None,
            cursor: ReplayCursor::default(),
        }
    }

    pub(crate) fn color(&self) -> AgentColor {
        self.color
    }

    pub(crate) fn recording(&self) -> Option<&Recording> {
        self.recording.as_ref()
    }

    pub(crate) fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            color: self.color,
            spawn: self.spawn,
            position: self.position,
            state: self.state,
            record_state: self.record_state,
            reached_destination: self.reached_destination,
            has_recording: self.recording.is_some(),
            motion: self.step.map(|step| Motion {
                from: step.from,
                to: step.to,
                progress: step.progress(self.step_duration),
            }),
        }
    }

    /// Applies a requested state transition.
    ///
    /// Entering `Recorded` without a recording demotes the agent to
    /// `Inactive`. Entering `Recorded` with one rewinds the replay cursor.
    pub(crate) fn set_state(&mut self, state: AgentState, out: &mut Vec<Event>) {
        match state {
            AgentState::Recorded if self.recording.is_none() => {
                debug!(agent = %self.color, "no recording to replay; agent stays inactive");
                self.change_state(AgentState::Inactive, out);
            }
            AgentState::Recorded => {
                self.step = None;
                self.cursor = ReplayCursor::default();
                self.change_state(AgentState::Recorded, out);
                self.set_record_state(RecordState::Play, out);
            }
            AgentState::Inactive => {
                self.change_state(AgentState::Inactive, out);
                if self.recording.is_some() {
                    self.set_record_state(RecordState::Available, out);
                }
            }
            AgentState::Idle | AgentState::Moving => {
                self.change_state(state, out);
                self.set_record_state(RecordState::None, out);
            }
        }
    }

    /// Starts a live step onto the adjacent tile `to`.
    pub(crate) fn move_to(
        &mut self,
        to: GridCoordinates,
        grid: &mut TileGrid,
        out: &mut Vec<Event>,
    ) -> Result<(), WorldError> {
        if self.step.is_some() {
            return Err(WorldError::AgentBusy(self.color));
        }
        if !grid.contains(to) {
            return Err(WorldError::OutOfBounds(to));
        }
        let from = self.position;
        if from.chebyshev_distance(to) > 1 || !from.same_floor(to) {
            return Err(WorldError::NotAdjacent {
                agent: self.color,
                from,
                to,
            });
        }

        grid.exit(from, self.color);
        self.step = Some(Step::new(from, to));
        self.reached_destination = false;
        out.push(Event::AgentStepStarted {
            agent: self.color,
            from,
            to,
        });
        self.set_state(AgentState::Moving, out);
        Ok(())
    }

    /// Hands a frozen recording to the agent.
    pub(crate) fn assign_recording(&mut self, recording: Recording, out: &mut Vec<Event>) {
        self.recording = Some(recording);
        self.set_record_state(RecordState::Available, out);
    }

    pub(crate) fn clear_recording(&mut self, out: &mut Vec<Event>) {
        self.recording = None;
        self.set_record_state(RecordState::None, out);
    }

    /// Returns the agent to its spawner, dropping any step or replay progress.
    pub(crate) fn reset_to_spawn(&mut self, out: &mut Vec<Event>) {
        self.position = self.spawn;
        self.step = None;
        self.reached_destination = true;
        self.cursor = ReplayCursor::default();
        self.set_state(AgentState::Inactive, out);
    }

    /// Freezes the agent in place without touching its record indicator.
    pub(crate) fn halt(&mut self, out: &mut Vec<Event>) {
        self.change_state(AgentState::Inactive, out);
    }

    /// Advances live movement or replay by `dt`.
    pub(crate) fn advance(&mut self, dt: Duration, grid: &mut TileGrid, out: &mut Vec<Event>) {
        match self.state {
            AgentState::Idle | AgentState::Moving => self.advance_live(dt, grid, out),
            AgentState::Recorded => self.advance_replay(dt, grid, out),
            AgentState::Inactive => {}
        }
    }

    fn advance_live(&mut self, dt: Duration, grid: &mut TileGrid, out: &mut Vec<Event>) {
        let Some(step) = self.step.as_mut() else {
            return;
        };
        step.elapsed = step.elapsed.saturating_add(dt);
        if step.elapsed < self.step_duration {
            return;
        }

        let Step { from, to, .. } = *step;
        self.step = None;
        grid.enter(to, self.color);
        self.position = to;
        self.reached_destination = true;
        out.push(Event::AgentStepCompleted {
            agent: self.color,
            from,
            to,
        });
        self.set_state(AgentState::Idle, out);
    }

    fn advance_replay(&mut self, dt: Duration, grid: &mut TileGrid, out: &mut Vec<Event>) {
        if self.cursor.halted {
            return;
        }
        if self.cursor.action_completed {
            self.cursor.index += 1;
            self.cursor.action_completed = false;
            self.cursor.action_checked = false;
        }

        let action = self
            .recording
            .as_ref()
            .and_then(|recording| recording.get(self.cursor.index))
            .copied();
        let Some(action) = action else {
            self.cursor.halted = true;
            self.set_record_state(RecordState::Completed, out);
            return;
        };

        match action {
            RecordedAction::IdleTime(duration) => {
                self.cursor.idle = self.cursor.idle.saturating_add(dt);
                if self.cursor.idle >= duration {
                    self.cursor.action_completed = true;
                    self.cursor.idle = Duration::ZERO;
                }
            }
            RecordedAction::TileMovement(target) => {
                if !self.cursor.action_checked {
                    if let Err(fault) = self.validate_step(target, grid) {
                        warn!(
                            agent = %self.color,
                            action_index = self.cursor.index,
                            %target,
                            ?fault,
                            "replay halted"
                        );
                        self.cursor.halted = true;
                        out.push(Event::ReplayHalted {
                            agent: self.color,
                            action_index: self.cursor.index,
                            target,
                            fault,
                        });
                        self.set_record_state(RecordState::Error, out);
                        return;
                    }
                    grid.exit(self.position, self.color);
                    self.step = Some(Step::new(self.position, target));
                    self.cursor.action_checked = true;
                    out.push(Event::AgentStepStarted {
                        agent: self.color,
                        from: self.position,
                        to: target,
                    });
                    // Live steps are issued after the world tick, so their
                    // first increment lands one tick later.
                    return;
                }

                let Some(step) = self.step.as_mut() else {
                    return;
                };
                step.elapsed = step.elapsed.saturating_add(dt);
                if step.elapsed < self.step_duration {
                    return;
                }

                let from = step.from;
                self.step = None;
                grid.enter(target, self.color);
                self.position = target;
                self.cursor.action_completed = true;
                out.push(Event::AgentStepCompleted {
                    agent: self.color,
                    from,
                    to: target,
                });
            }
        }
    }

    fn validate_step(&self, target: GridCoordinates, grid: &TileGrid) -> Result<(), ReplayFault> {
        if self.position.chebyshev_distance(target) > 1 || !self.position.same_floor(target) {
            return Err(ReplayFault::NotAdjacent);
        }
        if !grid.can_enter(target) {
            return Err(ReplayFault::TargetBlocked);
        }
        if !grid.tile_exists(self.position) {
            return Err(ReplayFault::MissingTile);
        }
        if !grid.can_enter(self.position) {
            return Err(ReplayFault::CurrentBlocked);
        }
        Ok(())
    }

    fn change_state(&mut self, state: AgentState, out: &mut Vec<Event>) {
        if self.state == state {
            return;
        }
        self.state = state;
        out.push(Event::AgentStateChanged {
            agent: self.color,
            state,
        });
    }

    fn set_record_state(&mut self, state: RecordState, out: &mut Vec<Event>) {
        if self.record_state == state {
            return;
        }
        self.record_state = state;
        out.push(Event::RecordStateChanged {
            agent: self.color,
            state,
        });
    }
}
