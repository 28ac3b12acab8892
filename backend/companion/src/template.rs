//! Placeholder substitution for persona prompt templates.
//!
//! Seven placeholders are recognised, each written as `{{name}}`:
//! `oc_character`, `user_name`, `oc_profile`, `task_name`, `task_time`,
//! `distraction_list`, `time_of_day`. Unknown placeholders are left intact.

use chrono::{DateTime, Local, TimeZone};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::warn;

use focusmate_core::{ConversationState, PersonaProfile, DEFAULT_PERSONA_NAME};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([a-z_]+)\s*\}\}").expect("placeholder regex is valid"));

/// Marker substituted when no distraction has been captured.
pub const NO_DISTRACTIONS: &str = "none";

const FALLBACK_USER_NAME: &str = "user";
const FALLBACK_TASK_NAME: &str = "the current task";
const DISTRACTION_SEPARATOR: &str = "; ";

/// Values for the seven placeholders. `None` selects the fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateVars {
    pub oc_character: Option<String>,
    pub user_name: Option<String>,
    pub oc_profile_summary: Option<String>,
    pub task_name: Option<String>,
    /// Elapsed focus time in seconds, rendered through [`format_duration`].
    pub task_time_secs: Option<u64>,
    pub distraction_list: Vec<String>,
    /// Pre-formatted `HH:MM` wall-clock time.
    pub time_of_day: Option<String>,
}

impl TemplateVars {
    /// Build the variables for one turn.
    pub fn from_context<Tz: TimeZone>(
        persona: Option<&PersonaProfile>,
        state: &ConversationState,
        distractions: &[String],
        now: &DateTime<Tz>,
    ) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            oc_character: persona.map(|p| p.name.clone()),
            user_name: persona.map(|p| p.user_title.clone()),
            oc_profile_summary: persona.map(PersonaProfile::summary),
            task_name: Some(state.current_task_name.clone()),
            task_time_secs: Some(state.elapsed_focus_secs),
            distraction_list: distractions.to_vec(),
            time_of_day: Some(format_time_of_day(now)),
        }
    }

    fn resolve(&self, placeholder: &str) -> Option<String> {
        let value = match placeholder {
            "oc_character" => non_empty(&self.oc_character)
                .unwrap_or(DEFAULT_PERSONA_NAME)
                .to_string(),
            "user_name" => non_empty(&self.user_name)
                .unwrap_or(FALLBACK_USER_NAME)
                .to_string(),
            "oc_profile" => self.oc_profile_summary.clone().unwrap_or_default(),
            "task_name" => non_empty(&self.task_name)
                .unwrap_or(FALLBACK_TASK_NAME)
                .to_string(),
            "task_time" => format_duration(self.task_time_secs.unwrap_or(0)),
            "distraction_list" => {
                if self.distraction_list.is_empty() {
                    NO_DISTRACTIONS.to_string()
                } else {
                    self.distraction_list.join(DISTRACTION_SEPARATOR)
                }
            }
            "time_of_day" => self
                .time_of_day
                .clone()
                .unwrap_or_else(|| format_time_of_day(&Local::now())),
            _ => return None,
        };
        Some(value)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Fill every known placeholder in `template`.
pub fn render(template: &str, vars: &TemplateVars) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            match vars.resolve(name) {
                Some(value) => value,
                None => {
                    warn!(placeholder = %name, "Unknown template placeholder left as-is");
                    caps[0].to_string()
                }
            }
        })
        .into_owned()
}

/// Human-readable duration: seconds below a minute, minutes below an hour,
/// hours and minutes above.
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        return plural(seconds, "second");
    }
    if seconds < 3600 {
        return plural(seconds / 60, "minute");
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    format!("{} {}", plural(hours, "hour"), plural(minutes, "minute"))
}

fn plural(n: u64, unit: &str) -> String {
    if n == 1 {
        format!("{n} {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

/// Wall-clock time as zero-padded `HH:MM`.
pub fn format_time_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use focusmate_core::TimerPhase;

    const ALL_PLACEHOLDERS: &str = "{{oc_character}}|{{user_name}}|{{oc_profile}}|{{task_name}}|\
                                    {{task_time}}|{{distraction_list}}|{{time_of_day}}";

    #[test]
    fn duration_units() {
        assert_eq!(format_duration(45), "45 seconds");
        assert_eq!(format_duration(1), "1 second");
        assert_eq!(format_duration(125), "2 minutes");
        assert_eq!(format_duration(3725), "1 hour 2 minutes");
        assert_eq!(format_duration(7260), "2 hours 1 minute");
    }

    #[test]
    fn renders_every_placeholder() {
        let persona = PersonaProfile {
            name: "Mochi".into(),
            user_title: "Captain".into(),
            ..Default::default()
        };
        let state = ConversationState {
            timer_phase: TimerPhase::Running,
            current_task_name: "thesis".into(),
            elapsed_focus_secs: 125,
        };
        let now = Utc::now();
        let vars = TemplateVars::from_context(Some(&persona), &state, &["buy milk".into()], &now);

        let out = render(ALL_PLACEHOLDERS, &vars);
        assert!(!out.contains("{{"));
        assert!(!out.contains("}}"));
        let parts: Vec<&str> = out.split('|').collect();
        assert_eq!(parts[0], "Mochi");
        assert_eq!(parts[1], "Captain");
        assert!(parts[2].starts_with("Mochi, Captain's"));
        assert_eq!(parts[3], "thesis");
        assert_eq!(parts[4], "2 minutes");
        assert_eq!(parts[5], "buy milk");
        assert_eq!(parts[6], now.format("%H:%M").to_string());
    }

    #[test]
    fn missing_values_use_fallbacks() {
        let out = render(ALL_PLACEHOLDERS, &TemplateVars::default());
        let parts: Vec<&str> = out.split('|').collect();
        assert_eq!(parts[0], DEFAULT_PERSONA_NAME);
        assert_eq!(parts[1], "user");
        assert_eq!(parts[2], "");
        assert_eq!(parts[3], "the current task");
        assert_eq!(parts[4], "0 seconds");
        assert_eq!(parts[5], NO_DISTRACTIONS);
        assert_eq!(parts[6].len(), 5);
    }

    #[test]
    fn distractions_are_joined_in_order() {
        let vars = TemplateVars {
            distraction_list: vec!["call mom".into(), "remind me to water plants".into()],
            ..Default::default()
        };
        assert_eq!(
            render("{{distraction_list}}", &vars),
            "call mom; remind me to water plants"
        );
    }

    #[test]
    fn unknown_placeholders_survive() {
        assert_eq!(render("hi {{mood}}", &TemplateVars::default()), "hi {{mood}}");
    }
}
