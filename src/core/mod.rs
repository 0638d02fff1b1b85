pub mod config;
pub mod session_manager;
pub mod replay;

// Repetition pipeline: features -> phase -> stage -> count
pub mod feature_extractor;
pub mod phase_classifier;
pub mod stage_machine;
pub mod ml_models;
pub mod feedback;
