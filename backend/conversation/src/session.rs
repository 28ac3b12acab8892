use focusmate_companion::PromptStateMachine;
use focusmate_core::{PromptState, TimerPhase};

/// Per-character conversation state owned by the orchestrator.
#[derive(Debug, Clone, Default)]
pub struct CompanionSession {
    pub machine: PromptStateMachine,
    /// Deferred reminders captured while focusing, oldest first.
    pub distractions: Vec<String>,
    /// Set while a chat turn for this character awaits the provider.
    pub in_flight: bool,
}

impl CompanionSession {
    /// Re-derive the prompt state. Parked reminders are untouched; only
    /// [`flush_distractions`](Self::flush_distractions) empties them.
    pub fn observe(&mut self, phase: TimerPhase) -> PromptState {
        self.machine.derive(phase)
    }

    pub fn flush_distractions(&mut self) -> Vec<String> {
        std::mem::take(&mut self.distractions)
    }
}
