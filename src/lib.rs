pub mod cli;
pub mod core;
pub mod models;
pub mod platform;

use crate::core::config::Config;
use crate::core::feedback::{Cue, CueFeedback};
use crate::core::ml_models::ModelManager;
use crate::core::session_manager::{ProfileBinding, SessionManager};
use crate::models::exercise::{
    ClassifierVariant, EngineResult, FrameResult, SessionKey, SessionState,
};
use crate::models::pose::LandmarkFrame;
use crate::platform::pose::{parse_landmarks_json, NullPoseEstimator, PoseEstimator};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing_subscriber::EnvFilter;

/// Session used by adapters when the caller does not name one
pub const DEFAULT_SESSION: &str = "default";

// Application state
pub struct AppState {
    pub session_manager: Arc<SessionManager>,
    pub config: Mutex<Config>,
    pub config_path: PathBuf,
    pub model_manager: ModelManager,
    pub feedback: Arc<CueFeedback>,
    pub pose_estimator: Box<dyn PoseEstimator>,
}

impl AppState {
    pub fn new(config: Config, config_path: PathBuf) -> EngineResult<Self> {
        let model_manager = ModelManager::new(config.model_dir.clone())?;
        let session_manager = Arc::new(SessionManager::new(config.session_config()));
        session_manager.replace_profiles(prepare_profiles(&config, &model_manager))?;

        let feedback = Arc::new(CueFeedback::new());
        session_manager.add_emitter(feedback.clone());

        Ok(Self {
            session_manager,
            config: Mutex::new(config),
            config_path,
            model_manager,
            feedback,
            pose_estimator: Box::new(NullPoseEstimator),
        })
    }
}

/// Pair every configured profile with its learned model from the cache.
///
/// A missing or unreadable model leaves the profile without a classifier.
pub fn prepare_profiles(config: &Config, models: &ModelManager) -> Vec<ProfileBinding> {
    config
        .profiles
        .values()
        .map(|profile| {
            let model = match &profile.classifier_variant {
                ClassifierVariant::Learned { model, .. } => match models.load(model) {
                    Ok(loaded) => Some(loaded),
                    Err(e) => {
                        tracing::warn!("Profile {}: {}", profile.name, e);
                        None
                    }
                },
                ClassifierVariant::RuleBased { .. } => None,
            };
            (profile.clone(), model)
        })
        .collect()
}

fn session_key(session_key: Option<String>) -> SessionKey {
    SessionKey::from(session_key.unwrap_or_else(|| DEFAULT_SESSION.to_string()))
}

// ==============================================================================
// Commands
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub profiles: Vec<String>,
    pub active_sessions: usize,
    pub pose_backend: String,
}

pub fn health(state: &AppState) -> Result<HealthStatus, String> {
    Ok(HealthStatus {
        status: "healthy".to_string(),
        profiles: state.session_manager.profile_names(),
        active_sessions: state.session_manager.session_count(),
        pose_backend: state.pose_estimator.get_model_info(),
    })
}

/// Observe one frame of MediaPipe landmark JSON
pub fn detect(
    landmarks_json: &str,
    session: Option<String>,
    state: &AppState,
) -> Result<FrameResult, String> {
    let frame = parse_landmarks_json(landmarks_json)
        .map_err(|e| format!("Failed to decode landmarks: {}", e))?;

    Ok(state.session_manager.observe(&session_key(session), &frame))
}

/// Observe one raw RGB frame through the configured pose backend
pub fn detect_image(
    frame_data: &[u8],
    width: u32,
    height: u32,
    session: Option<String>,
    state: &AppState,
) -> Result<FrameResult, String> {
    let frame = state
        .pose_estimator
        .process_frame(frame_data, width, height)
        .map_err(|e| format!("Failed to run pose estimation: {}", e))?
        .unwrap_or_else(LandmarkFrame::empty);

    Ok(state.session_manager.observe(&session_key(session), &frame))
}

pub fn reset_session(session: Option<String>, state: &AppState) -> Result<u32, String> {
    state
        .session_manager
        .reset(&session_key(session))
        .map_err(|e| format!("Failed to reset session: {}", e))
}

pub fn get_status(session: Option<String>, state: &AppState) -> Result<SessionState, String> {
    state
        .session_manager
        .status(&session_key(session))
        .map_err(|e| format!("Failed to get status: {}", e))
}

/// Cues emitted since the last call
pub fn take_cues(state: &AppState) -> Vec<(SessionKey, Cue)> {
    state.feedback.drain()
}

// Configuration management commands
pub fn get_config(state: &AppState) -> Result<Config, String> {
    let config = state
        .config
        .lock()
        .map_err(|e| format!("Failed to lock config: {}", e))?;

    Ok(config.clone())
}

/// Validate, persist, and apply a new configuration. Nothing is saved or
/// applied unless every profile (and its cached model) checks out. Profile
/// changes apply to sessions started afterwards; session tuning applies on
/// restart.
pub fn update_config(config: Config, state: &AppState) -> Result<(), String> {
    config
        .validate()
        .map_err(|e| format!("Invalid configuration: {}", e))?;

    apply_config(config, state)
}

pub fn reset_config(state: &AppState) -> Result<Config, String> {
    let default_config = Config::default();
    apply_config(default_config.clone(), state)
        .map_err(|e| format!("Failed to reset config: {}", e))?;

    Ok(default_config)
}

fn apply_config(config: Config, state: &AppState) -> Result<(), String> {
    let profiles = prepare_profiles(&config, &state.model_manager);
    state
        .session_manager
        .check_profiles(&profiles)
        .map_err(|e| format!("Failed to apply profiles: {}", e))?;

    config
        .save_to(&state.config_path)
        .map_err(|e| format!("Failed to save config: {}", e))?;

    state
        .session_manager
        .replace_profiles(profiles)
        .map_err(|e| format!("Failed to apply profiles: {}", e))?;

    let mut current_config = state
        .config
        .lock()
        .map_err(|e| format!("Failed to lock config: {}", e))?;
    *current_config = config;

    Ok(())
}

// ==============================================================================
// Entry Point
// ==============================================================================

pub fn run() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    // --verbose raises the default level; RUST_LOG still wins
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::get_config_path()?,
    };

    cli::execute(cli.command, config_path)
}
