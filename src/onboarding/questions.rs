//! The canned onboarding questions and which profile field each answer fills.

use crate::store::ProfileField;

/// Placeholder replaced with the captured display name.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Used in place of the name before one has been captured.
const NAME_FALLBACK: &str = "there";

/// A single onboarding question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Question {
    pub text: &'static str,
    /// Profile field the user's answer to this question is written into.
    pub answer_field: Option<ProfileField>,
}

/// Questions served in order, one per message, to every new session.
pub const QUESTIONS: &[Question] = &[
    Question {
        text: "What should I call you?",
        answer_field: Some(ProfileField::Username),
    },
    Question {
        text: "Nice to meet you, {name}! On a typical day, how many hours do you study?",
        answer_field: Some(ProfileField::StudyTime),
    },
    Question {
        text: "And how many hours a day do you spend on your phone?",
        answer_field: Some(ProfileField::PhoneTime),
    },
    Question {
        text: "Thanks, {name}! What subject or goal would you like to focus on first?",
        answer_field: None,
    },
];

/// Number of onboarding questions; the cursor never exceeds this.
pub fn question_count() -> u32 {
    QUESTIONS.len() as u32
}

/// The profile field filled by a message that arrives at `cursor`.
///
/// The message at cursor `c` answers the question served at `c - 1`, so the
/// very first message (cursor 0) captures nothing.
pub fn capture_field(cursor: u32) -> Option<ProfileField> {
    let previous = usize::try_from(cursor).ok()?.checked_sub(1)?;
    QUESTIONS.get(previous).and_then(|q| q.answer_field)
}

/// Render a question, substituting the display name if one is known.
pub fn render_question(question: &Question, name: Option<&str>) -> String {
    let name = name
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(NAME_FALLBACK);
    question.text.replace(NAME_PLACEHOLDER, name)
}
