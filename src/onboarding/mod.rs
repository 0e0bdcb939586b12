//! Onboarding: fixed questionnaire served before free-form chat.
//!
//! Each new session walks a short list of canned questions. The cursor on the
//! session row records how far it got; once it reaches the end of the list,
//! the session is in free-form mode for good.

pub mod questions;
pub mod routes;
pub mod tracker;

pub use questions::{QUESTIONS, Question, capture_field, question_count, render_question};
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use tracker::{CapturedFields, OnboardingStatus, QuestionTracker};
