//! Flags utterances that ask to defer something ("remind me later") so they
//! can be parked while the user is focusing.
//!
//! Plain case-sensitive substring matching. Over-capturing is acceptable;
//! a missed reminder is a quality bug.

/// Keywords denoting remember/remind-me-later semantics.
pub const DISTRACTION_KEYWORDS: &[&str] = &[
    // zh-CN
    "提醒",
    "记一下",
    "别忘了",
    "记住",
    "待会",
    "稍后",
    "备忘",
    // en
    "remind",
    "Remind",
    "remember",
    "Remember",
    "don't forget",
    "Don't forget",
    "later",
    "Later",
    "note this",
    "Note this",
    "note down",
    "Note down",
    "memo",
];

/// Whether `utterance` should be captured as a deferred distraction.
pub fn is_distraction(utterance: &str) -> bool {
    DISTRACTION_KEYWORDS
        .iter()
        .any(|keyword| utterance.contains(keyword))
}
