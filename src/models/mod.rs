// Data models for pose landmarks, exercise profiles, and session state

pub mod pose;
pub mod exercise;
