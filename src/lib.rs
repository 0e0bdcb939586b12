//! Study Coach: onboarding questionnaire and AI study-advice chat over HTTP.

pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod onboarding;
pub mod schedule;
pub mod store;
