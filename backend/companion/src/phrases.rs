//! One-shot instruction prompts for generating short persona lines
//! (greetings, encouragements, focus reminders).

use std::fmt;

use serde::{Deserialize, Serialize};

/// What kind of lines to generate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PhraseKind {
    Greeting,
    #[default]
    Encourage,
    Remind,
}

impl PhraseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhraseKind::Greeting => "greeting",
            PhraseKind::Encourage => "encourage",
            PhraseKind::Remind => "remind",
        }
    }

    fn noun(&self) -> &'static str {
        match self {
            PhraseKind::Greeting => "greetings",
            PhraseKind::Encourage => "encouragements",
            PhraseKind::Remind => "focus reminders",
        }
    }
}

impl fmt::Display for PhraseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How stern a focus reminder should sound.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum RemindLevel {
    #[default]
    Normal,
    Annoyed,
    Angry,
}

impl RemindLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemindLevel::Normal => "normal",
            RemindLevel::Annoyed => "annoyed",
            RemindLevel::Angry => "angry",
        }
    }

    /// Unknown names fall back to `Normal`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "annoyed" => RemindLevel::Annoyed,
            "angry" => RemindLevel::Angry,
            _ => RemindLevel::Normal,
        }
    }

    fn description(&self) -> &'static str {
        match self {
            RemindLevel::Normal => {
                "- Level: gentle reminder
- Tone: soft, caring, light
- Content: gently remind the user they are focusing and ask if they need help
- Attitude: understands the user may need rest, but encourages finishing the current pomodoro"
            }
            RemindLevel::Annoyed => {
                "- Level: annoyed reminder
- Tone: a little displeased, pouting, small tantrum
- Content: show displeasure that the user is distracted and not focused enough
- Attitude: a bit cross, but still cares about the user
- Interjections like \"hmph\" or \"honestly!\" are welcome"
            }
            RemindLevel::Angry => {
                "- Level: angry reminder
- Tone: serious, angry, forceful
- Content: clearly state displeasure and demand the user returns to focus
- Attitude: very angry, possibly stern
- Firm phrases like \"hurry up\" or \"concentrate\" are welcome
- Still stay in character, never be excessively aggressive"
            }
        }
    }
}

impl fmt::Display for RemindLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional speaking-style hint for encouragements and reminders.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceStyle {
    Gentle,
    Tsundere,
    Cheerful,
    Cool,
    Mature,
    Sarcastic,
    Shy,
    Doting,
}

impl ReferenceStyle {
    pub fn description(&self) -> &'static str {
        match self {
            ReferenceStyle::Gentle => {
                "Gentle guardian - tender and considerate, supports the user like a protector, soft tone"
            }
            ReferenceStyle::Tsundere => {
                "Tsundere - sharp-tongued but caring inside, sometimes gets flustered"
            }
            ReferenceStyle::Cheerful => {
                "Cheerful - full of energy and vitality, upbeat and positive"
            }
            ReferenceStyle::Cool => {
                "Cool and calm - few words, rational, but occasionally lets care show"
            }
            ReferenceStyle::Mature => {
                "Mature and steady - like an older sibling, reassuring and dependable"
            }
            ReferenceStyle::Sarcastic => {
                "Sly - gentle on the surface, likes to tease the user a little"
            }
            ReferenceStyle::Shy => "Shy - introverted, speaks carefully, sometimes stammers",
            ReferenceStyle::Doting => {
                "Doting - spoils the user like a child, warm and indulgent"
            }
        }
    }
}

/// Inputs for a phrase-generation prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhrasePrompt {
    pub kind: PhraseKind,
    pub persona_description: String,
    pub user_title: String,
    pub quantity: usize,
    pub remind_level: RemindLevel,
    pub reference_style: Option<ReferenceStyle>,
}

/// Build the full one-shot system prompt for a phrase batch.
pub fn build_phrase_prompt(input: &PhrasePrompt) -> String {
    let mut prompt = base_prompt(&input.persona_description, &input.user_title, input.quantity);
    match input.kind {
        PhraseKind::Greeting => prompt.push_str(&greeting_block(input.quantity)),
        PhraseKind::Encourage => {
            prompt.push_str(&encourage_block(input.reference_style, input.quantity))
        }
        PhraseKind::Remind => prompt.push_str(&remind_block(
            input.remind_level,
            input.reference_style,
            input.quantity,
        )),
    }
    prompt
}

fn base_prompt(description: &str, user_title: &str, quantity: usize) -> String {
    format!(
        r#"You are an original character (OC) created by the user.
[Character description]
{description}

[User]
Address the user as: {user_title}

[Requirements]
- Always call the user "{user_title}"
- Match the character's personality and speaking style exactly
- Keep every line short (15-35 characters)
- Emoticons or emoji are fine when they fit the character
- Vary the {quantity} lines, never repeat yourself
"#
    )
}

fn output_format(kind: PhraseKind, quantity: usize) -> String {
    let noun = kind.noun();
    format!(
        r#"
[Output format]
Output exactly {quantity} {noun}, one per line, without numbering or any other markers:
line 1
line 2
line 3
...
"#
    )
}

fn style_block(style: Option<ReferenceStyle>) -> String {
    style
        .map(|s| format!("\n[Reference style] {}\n", s.description()))
        .unwrap_or_default()
}

fn greeting_block(quantity: usize) -> String {
    let mut block = format!(
        r#"
[Task]
Generate {quantity} greetings.

[Scenarios]
- The user just opened the pomodoro app
- The user is about to start a pomodoro
- The user came back to the focus page from elsewhere

[Tone]
- Friendly, welcoming, warm
- True to the character
- A hint of looking forward to the user getting started
"#
    );
    block.push_str(&output_format(PhraseKind::Greeting, quantity));
    block
}

fn encourage_block(style: Option<ReferenceStyle>, quantity: usize) -> String {
    let mut block = format!(
        r#"
[Task]
Generate {quantity} encouragements.

[Scenarios]
- The user is in the middle of a pomodoro
- The user may feel tired or want to give up
- The user is pushing through the current task

[Tone]
- Warm, supportive, understanding
- Acknowledge the user's effort
- Give positive reinforcement
"#
    );
    block.push_str(&style_block(style));
    block.push_str(&output_format(PhraseKind::Encourage, quantity));
    block
}

fn remind_block(level: RemindLevel, style: Option<ReferenceStyle>, quantity: usize) -> String {
    let mut block = format!(
        r#"
[Task]
Generate {quantity} focus reminders.

[Scenarios]
- The user taps the character's avatar during a pomodoro
- The user may be distracted or want to give up
- The user needs to be brought back to focus

[Reminder level]
{}
"#,
        level.description()
    );
    block.push_str(&style_block(style));
    block.push_str(&output_format(PhraseKind::Remind, quantity));
    block
}
