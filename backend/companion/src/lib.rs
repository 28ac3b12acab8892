pub mod distraction;
pub mod phrases;
pub mod prompt_state;
pub mod prompts;
pub mod registry;
pub mod template;

pub use distraction::{is_distraction, DISTRACTION_KEYWORDS};
pub use phrases::{
    build_phrase_prompt, PhraseKind, PhrasePrompt, ReferenceStyle,
    RemindLevel,
};
pub use prompt_state::{derive_prompt_state, PromptMode, PromptStateMachine};
pub use prompts::TemplateSet;
pub use registry::PersonaRegistry;
pub use template::{format_duration, render, TemplateVars};
