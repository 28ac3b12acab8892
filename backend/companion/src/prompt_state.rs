//! Prompt state machine: maps timer phases to conversational modes.
//!
//! The mode is one value with two mutators. `derive` records the latest timer
//! phase; `force_finish` pins the mode to `finish` after a completed pomodoro.
//! The concrete [`PromptState`] is only computed on read.

use tracing::debug;

use focusmate_core::{PromptState, TimerPhase};

/// Source of truth for the current prompt state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptMode {
    /// Follows the last observed timer phase.
    Derived(TimerPhase),
    /// Set by a "pomodoro completed" event.
    ForcedFinish,
}

impl PromptMode {
    pub fn resolve(&self) -> PromptState {
        match self {
            PromptMode::Derived(phase) => derive_prompt_state(*phase),
            PromptMode::ForcedFinish => PromptState::Finish,
        }
    }
}

impl Default for PromptMode {
    fn default() -> Self {
        PromptMode::Derived(TimerPhase::Idle)
    }
}

/// Pure phase mapping. `Finished` maps to `Idle`: `finish` is only reachable
/// through [`PromptStateMachine::force_finish`].
pub fn derive_prompt_state(phase: TimerPhase) -> PromptState {
    match phase {
        TimerPhase::Idle | TimerPhase::Finished => PromptState::Idle,
        TimerPhase::Running => PromptState::Start,
        TimerPhase::Paused => PromptState::Break,
    }
}

#[derive(Debug, Clone, Default)]
pub struct PromptStateMachine {
    mode: PromptMode,
}

impl PromptStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-derive from the timer phase and return the resulting state.
    ///
    /// A forced finish survives derivations while the timer is at rest
    /// (`Idle`/`Finished`); a `Running` or `Paused` phase starts a new focus
    /// cycle and overwrites it.
    ///
    /// This is deliberate. A completed pomodoro leaves the timer at rest, and
    /// the chat turns that follow re-derive from that same resting phase. If
    /// any derivation cleared the override, `finish` would never reach a turn.
    /// Only a phase change that begins a new cycle ends it.
    pub fn derive(&mut self, phase: TimerPhase) -> PromptState {
        let keep_finish = self.mode == PromptMode::ForcedFinish
            && matches!(phase, TimerPhase::Idle | TimerPhase::Finished);

        if !keep_finish {
            self.mode = PromptMode::Derived(phase);
        }

        let state = self.mode.resolve();
        debug!(phase = %phase, state = %state, "Prompt state derived");
        state
    }

    /// Pin the state to `finish` until the next focus cycle begins.
    pub fn force_finish(&mut self) {
        self.mode = PromptMode::ForcedFinish;
        debug!("Prompt state forced to finish");
    }

    pub fn current(&self) -> PromptState {
        self.mode.resolve()
    }

    pub fn mode(&self) -> PromptMode {
        self.mode
    }
}
