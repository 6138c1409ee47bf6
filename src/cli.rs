//! CLI interface for lesson-recommender

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{self, Config};
use crate::engine::RecommendationEngine;
use crate::profile::{LearnerId, LearnerRecord, LessonId, LessonRecord, Skill, SkillLevels};
use crate::store::{LearnerStore, LessonStore, SqliteStore};

#[derive(Parser)]
#[command(name = "lesson-recommender")]
#[command(about = "Adaptive lesson recommendations driven by learner ratings and skill gaps", long_about = None)]
#[command(version)]
pub struct Cli {
    /// SQLite database file (overrides the config file)
    #[arg(long, global = true, env = "LESSON_RECOMMENDER_DB")]
    db: Option<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recommend lessons for a learner
    Recommend {
        learner_id: LearnerId,
    },
    /// Show a learner's rating and proficiencies
    Stats {
        learner_id: LearnerId,
    },
    /// Record the result of a lesson attempt
    Outcome {
        learner_id: LearnerId,
        lesson_id: LessonId,
        /// The learner passed the lesson
        #[arg(long, conflicts_with = "failed", required_unless_present = "failed")]
        passed: bool,
        /// The learner failed the lesson
        #[arg(long)]
        failed: bool,
    },
    /// Show recent attempts for a learner
    History {
        learner_id: LearnerId,
        /// Maximum attempts to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Rank learners by rating
    Leaderboard {
        /// Maximum learners to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Mark a lesson as completed so it is no longer recommended
    Complete {
        learner_id: LearnerId,
        lesson_id: LessonId,
    },
    /// Manage learners
    Learner {
        #[command(subcommand)]
        command: LearnerCommands,
    },
    /// Manage lessons
    Lesson {
        #[command(subcommand)]
        command: LessonCommands,
    },
    /// Show or reset configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum LearnerCommands {
    /// Add a learner
    Add {
        name: String,
        /// Starting rating (defaults to the configured baseline)
        #[arg(long)]
        rating: Option<i32>,
        #[arg(long)]
        grammar: Option<f64>,
        #[arg(long)]
        vocab: Option<f64>,
        #[arg(long)]
        listening: Option<f64>,
    },
    /// List all learners
    List,
}

#[derive(Subcommand)]
enum LessonCommands {
    /// Add a lesson
    Add {
        name: String,
        /// Difficulty rating (defaults to the configured baseline)
        #[arg(long)]
        difficulty: Option<i32>,
        /// Grammar weight in [0, 1]
        #[arg(long)]
        grammar: Option<f64>,
        /// Vocabulary weight in [0, 1]
        #[arg(long)]
        vocab: Option<f64>,
        /// Listening weight in [0, 1]
        #[arg(long)]
        listening: Option<f64>,
        /// Store the lesson as inactive
        #[arg(long)]
        inactive: bool,
    },
    /// List all lessons, including inactive ones
    List,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
    /// Overwrite the config file with defaults
    Reset,
}

impl Cli {
    /// Subscriber level: DEBUG with `-v`, WARN otherwise
    pub fn log_level(&self) -> tracing::Level {
        if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        }
    }
}

pub async fn run(cli: Cli) -> Result<()> {
    // Config commands never touch the database
    if let Commands::Config { command } = &cli.command {
        return run_config(command, cli.config.as_deref());
    }

    let config = load_config(cli.config.as_deref())?;
    let db_path = match &cli.db {
        Some(path) => path.clone(),
        None => config.storage.database_path()?,
    };
    let store = Arc::new(
        SqliteStore::new(&db_path)
            .await
            .with_context(|| format!("Failed to open database {}", db_path.display()))?,
    );
    let engine = RecommendationEngine::new(store.clone(), config.engine.clone());
    let json = cli.json;

    match cli.command {
        Commands::Recommend { learner_id } => {
            let recs = engine
                .recommend(learner_id)
                .await
                .with_context(|| format!("Failed to recommend lessons for learner {}", learner_id))?;
            if json {
                return print_json(&recs);
            }
            if recs.is_empty() {
                println!("No lessons near learner {}'s level.", learner_id);
            }
            for (i, rec) in recs.iter().enumerate() {
                println!(
                    "{}. [{}] {} (difficulty {}, match {:.3})",
                    i + 1, rec.lesson_id, rec.lesson_name, rec.difficulty_rating, rec.similarity
                );
            }
        }
        Commands::Stats { learner_id } => {
            let stats = engine
                .get_stats(learner_id)
                .await
                .with_context(|| format!("Failed to load learner {}", learner_id))?;
            if json {
                return print_json(&stats);
            }
            println!("Learner {} ({})", stats.learner_id, stats.name);
            println!("Rating: {}", stats.rating);
            print_skills(&SkillLevels::new(
                stats.grammar_proficiency,
                stats.vocab_proficiency,
                stats.listening_proficiency,
            ));
        }
        Commands::Outcome { learner_id, lesson_id, passed, failed } => {
            let passed = passed && !failed;
            let report = engine
                .process_outcome(learner_id, lesson_id, passed)
                .await
                .with_context(|| {
                    format!(
                        "Failed to record outcome for learner {} on lesson {}",
                        learner_id, lesson_id
                    )
                })?;
            if json {
                return print_json(&report);
            }
            println!(
                "Learner {} {} lesson {}",
                learner_id, if passed { "passed" } else { "failed" }, lesson_id
            );
            println!(
                "Rating: {} -> {} ({:+})",
                report.previous_rating, report.new_rating, report.rating_delta
            );
            println!(
                "Lesson difficulty: {} -> {}",
                report.previous_lesson_difficulty, report.new_lesson_difficulty
            );
            for skill in Skill::ALL {
                println!(
                    "  {:<10} {:.3} -> {:.3} ({:+.3})",
                    skill,
                    report.previous_proficiencies.get(skill),
                    report.new_proficiencies.get(skill),
                    report.proficiency_deltas.get(skill)
                );
            }
        }
        Commands::History { learner_id, limit } => {
            let attempts = engine
                .history(learner_id, limit)
                .await
                .with_context(|| format!("Failed to load history for learner {}", learner_id))?;
            if json {
                return print_json(&attempts);
            }
            if attempts.is_empty() {
                println!("No attempts recorded.");
            }
            for attempt in &attempts {
                println!(
                    "{} lesson {:<4} {:<6} rating {} -> {}, lesson {} -> {}",
                    attempt.recorded_at.format("%Y-%m-%d %H:%M:%S"),
                    attempt.lesson_id,
                    if attempt.passed { "pass" } else { "fail" },
                    attempt.learner_rating_before,
                    attempt.learner_rating_after,
                    attempt.lesson_rating_before,
                    attempt.lesson_rating_after
                );
            }
        }
        Commands::Leaderboard { limit } => {
            let board = engine.leaderboard(limit).await?;
            if json {
                return print_json(&board);
            }
            for entry in &board {
                println!(
                    "{:>3}. {:<20} {} (id {})",
                    entry.rank, entry.name, entry.rating, entry.learner_id
                );
            }
        }
        Commands::Complete { learner_id, lesson_id } => {
            engine
                .mark_completed(learner_id, lesson_id)
                .await
                .with_context(|| {
                    format!(
                        "Failed to mark lesson {} completed for learner {}",
                        lesson_id, learner_id
                    )
                })?;
            if !json {
                println!("Lesson {} marked completed for learner {}.", lesson_id, learner_id);
            }
        }
        Commands::Learner { command } => match command {
            LearnerCommands::Add { name, rating, grammar, vocab, listening } => {
                let id = store
                    .insert_learner(&LearnerRecord {
                        rating,
                        grammar_proficiency: grammar,
                        vocab_proficiency: vocab,
                        listening_proficiency: listening,
                        ..LearnerRecord::draft(&name)
                    })
                    .await?;
                if json {
                    return print_json(&serde_json::json!({ "id": id }));
                }
                println!("Added learner {} ({}).", id, name);
            }
            LearnerCommands::List => {
                let learners: Vec<_> = store
                    .list_learners()
                    .await?
                    .iter()
                    .map(|record| record.resolve(engine.config()))
                    .collect();
                if json {
                    return print_json(&learners);
                }
                for learner in &learners {
                    println!("[{}] {:<20} rating {}", learner.id, learner.name, learner.rating);
                }
            }
        },
        Commands::Lesson { command } => match command {
            LessonCommands::Add { name, difficulty, grammar, vocab, listening, inactive } => {
                let id = store
                    .insert_lesson(&LessonRecord {
                        difficulty_rating: difficulty,
                        grammar_weight: grammar,
                        vocab_weight: vocab,
                        listening_weight: listening,
                        active: !inactive,
                        ..LessonRecord::draft(&name)
                    })
                    .await?;
                if json {
                    return print_json(&serde_json::json!({ "id": id }));
                }
                println!("Added lesson {} ({}).", id, name);
            }
            LessonCommands::List => {
                let lessons: Vec<_> = store
                    .list_lessons()
                    .await?
                    .iter()
                    .map(|record| record.resolve(engine.config()))
                    .collect();
                if json {
                    return print_json(&lessons);
                }
                for lesson in &lessons {
                    println!(
                        "[{}] {:<24} difficulty {:<5} g/v/l {:.2}/{:.2}/{:.2}{}",
                        lesson.id,
                        lesson.name,
                        lesson.difficulty_rating,
                        lesson.weights.grammar,
                        lesson.weights.vocab,
                        lesson.weights.listening,
                        if lesson.active { "" } else { " (inactive)" }
                    );
                }
            }
        },
        Commands::Config { command } => run_config(&command, cli.config.as_deref())?,
    }

    Ok(())
}

/// An explicit `--config` must exist; the default location is created on demand
fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

fn run_config(command: &ConfigCommands, path: Option<&Path>) -> Result<()> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config::config_path()?,
    };

    match command {
        ConfigCommands::Show => {
            if !path.exists() {
                println!("# {} (not written yet, showing defaults)", path.display());
                println!("{}", config::default_config_toml());
                return Ok(());
            }
            let config = Config::load_from(&path)?;
            let contents = toml::to_string_pretty(&config)
                .context("Failed to serialize config")?;
            println!("# {}", path.display());
            println!("{}", contents);
        }
        ConfigCommands::Path => {
            println!("{}", path.display());
        }
        ConfigCommands::Reset => {
            Config::default().save_to(&path)?;
            println!("Configuration reset to defaults at {}", path.display());
        }
    }
    Ok(())
}

fn print_skills(levels: &SkillLevels) {
    for skill in Skill::ALL {
        println!("  {:<10} {:.3}", skill, levels.get(skill));
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value)
        .context("Failed to serialize output")?;
    println!("{}", out);
    Ok(())
}
