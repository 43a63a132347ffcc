pub mod conversation;
pub mod escalation;
pub mod profile;
