//! Command-line interface

use crate::core::config::Config;
use crate::core::replay::replay_frames;
use crate::models::exercise::ClassifierVariant;
use crate::AppState;
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

/// Repetition counter driven by body-pose landmarks
#[derive(Parser, Debug)]
#[command(name = "repcoach")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Count repetitions in a recorded landmark stream (one JSON frame per line)
    Replay {
        /// Input file (JSON lines)
        #[arg(short, long)]
        input: PathBuf,

        /// Exercise profile (defaults to the configured exercise)
        #[arg(short, long)]
        exercise: Option<String>,

        /// Cached model to use instead of the profile's own
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List configured exercise profiles
    Profiles,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Reset to default configuration
    Reset,
}

pub fn execute(command: Commands, config_path: PathBuf) -> anyhow::Result<()> {
    match command {
        Commands::Replay {
            input,
            exercise,
            model,
        } => {
            let config = Config::load_from(&config_path)?;
            run_replay(config, config_path, &input, exercise, model)
        }
        Commands::Profiles => run_profiles(&Config::load_from(&config_path)?),
        Commands::Config { action } => run_config(action, &config_path),
    }
}

fn run_replay(
    config: Config,
    config_path: PathBuf,
    input: &PathBuf,
    exercise: Option<String>,
    model: Option<String>,
) -> anyhow::Result<()> {
    let exercise = exercise.unwrap_or_else(|| config.default_exercise.clone());
    let state = AppState::new(config, config_path)?;

    if let Some(model_name) = model {
        let mut profile = {
            let config = state
                .config
                .lock()
                .map_err(|e| anyhow::anyhow!("Failed to lock config: {}", e))?;
            config
                .profiles
                .get(&exercise)
                .cloned()
                .with_context(|| format!("Unknown exercise profile: {}", exercise))?
        };

        let landmark_count = match profile.classifier_variant {
            ClassifierVariant::Learned { landmark_count, .. } => landmark_count,
            ClassifierVariant::RuleBased { .. } => {
                bail!("Profile {} is rule-based and takes no model", exercise)
            }
        };
        profile.classifier_variant = ClassifierVariant::Learned {
            model: model_name.clone(),
            landmark_count,
        };

        let loaded = state
            .model_manager
            .load(&model_name)
            .with_context(|| format!("Failed to load model {}", model_name))?;
        state.session_manager.register_profile(profile, Some(loaded))?;
    }

    let session = state.session_manager.create_session(Some(&exercise))?;
    let reader = BufReader::new(
        File::open(input).with_context(|| format!("Failed to open {:?}", input))?,
    );

    let summary = replay_frames(&state.session_manager, &session, reader, |_, result| {
        match serde_json::to_string(result) {
            Ok(line) => println!("{}", line),
            Err(e) => tracing::warn!("Cannot encode frame result: {}", e),
        }
        for (_, cue) in state.feedback.drain() {
            tracing::info!("{} [{}]", cue.text(), cue.phrase_key());
        }
    })?;

    tracing::info!(
        "Replayed {} frames ({} detected): {} reps, {} sets",
        summary.frames,
        summary.detected_frames,
        summary.reps,
        summary.sets
    );
    println!("{}", serde_json::to_string(&summary)?);

    Ok(())
}

fn run_profiles(config: &Config) -> anyhow::Result<()> {
    for (name, profile) in &config.profiles {
        let marker = if *name == config.default_exercise { "*" } else { " " };
        println!(
            "{} {:<12} {:<10} {} -> {} ({}, min confidence {:.2})",
            marker,
            name,
            profile.classifier_variant.to_string(),
            profile.stage_a_label,
            profile.stage_b_label,
            profile.counted_transition.to_string(),
            profile.min_confidence
        );
    }
    Ok(())
}

fn run_config(action: ConfigAction, config_path: &PathBuf) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            let config = Config::load_from(config_path)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Reset => {
            let config = Config::default();
            config.save_to(config_path)?;
            println!("Configuration reset: {:?}", config_path);
        }
    }
    Ok(())
}
