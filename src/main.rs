use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::info;

use studyd::config::StudydConfig;
use studyd::error::IntelError;
use studyd::generation::{DisabledGenerator, HttpTextGenerator, TextGenerator};
use studyd::intel::{build_intel_state, refresh_exam_threats};
use studyd::jobs::{runner, JobQueue};
use studyd::observability::HealthStatus;
use studyd::storage::Storage;
use studyd::{coaching, mastery, AppContext};

#[derive(Parser)]
#[command(
    name = "studyd",
    about = "studyd — always-on study-intelligence and coaching daemon",
    version
)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Data directory for the SQLite database and config.toml
    #[arg(long, env = "STUDYD_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "STUDYD_LOG")]
    log: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon in the foreground (default when no subcommand given).
    ///
    /// Starts the background job worker and the periodic tickers: daily
    /// intel, study nudges, exam threshold alerts, coaching regeneration,
    /// and the coaching expiry sweep.
    Serve,
    /// Print daemon health as JSON.
    Status,
    /// Register or update a user.
    User {
        id: String,
        /// Display name
        #[arg(long, default_value = "")]
        name: String,
        /// Weekly study goal in minutes
        #[arg(long)]
        weekly_goal: Option<i64>,
    },
    /// Build and print the full intelligence snapshot for a user.
    Intel {
        user: String,
    },
    /// Regenerate coaching messages for a user and print the stored batch.
    Coach {
        user: String,
    },
    /// Log a completed study session and run post-session analysis.
    Log {
        user: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        topic: Option<String>,
        #[arg(long)]
        minutes: i64,
        /// Self-rated effectiveness, 1-10
        #[arg(long)]
        effectiveness: Option<i64>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Record a spaced-repetition review of a topic (quality 1-5).
    Review {
        user: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        topic: String,
        #[arg(long)]
        quality: i64,
    },
    /// Manage exams.
    Exam {
        #[command(subcommand)]
        action: ExamAction,
    },
}

#[derive(Subcommand)]
enum ExamAction {
    /// Add an exam. Date accepts RFC 3339 or YYYY-MM-DD.
    Add {
        user: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        topic: Option<String>,
        #[arg(long)]
        date: String,
        #[arg(long, default_value_t = 100.0)]
        weight: f64,
        #[arg(long)]
        target_grade: Option<String>,
    },
    /// List a user's exams with their latest threat snapshots.
    List {
        user: String,
    },
    /// Update an exam's fields.
    Set {
        user: String,
        id: String,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        topic: Option<String>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        weight: Option<f64>,
        #[arg(long)]
        target_grade: Option<String>,
    },
    /// Delete an exam.
    Rm {
        user: String,
        id: String,
    },
}

fn init_tracing(config: &StudydConfig) {
    let filter = tracing_subscriber::EnvFilter::try_new(&config.log)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if config.log_format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_generator(config: &StudydConfig) -> Arc<dyn TextGenerator> {
    match &config.generation.endpoint {
        Some(endpoint) => Arc::new(HttpTextGenerator::new(
            endpoint.clone(),
            config.generation.model.clone(),
            config.generation.api_key.clone(),
        )),
        None => Arc::new(DisabledGenerator),
    }
}

fn parse_exam_date(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")?;
    Ok(date
        .and_hms_opt(9, 0, 0)
        .expect("valid time of day")
        .and_utc())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = StudydConfig::new(args.data_dir, args.log);
    init_tracing(&config);

    let storage = Storage::new_with_slow_query(
        &config.data_dir,
        config.observability.slow_query_threshold_ms,
    )
    .await?;
    let generator = build_generator(&config);
    let ctx = AppContext::new(config, storage, generator);

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(ctx).await,
        Command::Status => {
            let db_ok = ctx.storage.ping().await;
            let status = HealthStatus::ok(ctx.started_at.elapsed().as_secs(), db_ok);
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Command::User {
            id,
            name,
            weekly_goal,
        } => {
            let goal = weekly_goal.unwrap_or(ctx.config.default_weekly_goal);
            let user = ctx.storage.ensure_user(&id, &name, goal).await?;
            println!("{}", serde_json::to_string_pretty(&user)?);
            Ok(())
        }
        Command::Intel { user } => {
            let state = build_intel_state(&ctx.storage, &user).await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
            Ok(())
        }
        Command::Coach { user } => {
            let state = build_intel_state(&ctx.storage, &user).await?;
            let now = Utc::now();
            let messages = coaching::generate_coaching_plans(&state, now);
            ctx.coaching.replace_active(&user, &messages, now).await?;
            let stored = ctx.coaching.active_messages(&user, now).await?;
            println!("{}", serde_json::to_string_pretty(&stored)?);
            Ok(())
        }
        Command::Log {
            user,
            subject,
            topic,
            minutes,
            effectiveness,
            notes,
        } => log_session(&ctx, &user, &subject, topic, minutes, effectiveness, notes).await,
        Command::Review {
            user,
            subject,
            topic,
            quality,
        } => {
            let outcome =
                mastery::review::review_topic(&ctx.storage, &user, &subject, &topic, quality)
                    .await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Command::Exam { action } => run_exam_action(&ctx, action).await,
    }
}

/// Run the daemon: worker + tickers until interrupted.
async fn serve(ctx: AppContext) -> Result<()> {
    info!(
        version = env!("CARGO_PKG_VERSION"),
        data_dir = %ctx.config.data_dir.display(),
        "studyd starting"
    );

    let queue = Arc::new(JobQueue::new());
    runner::spawn_tickers(ctx.clone(), Arc::clone(&queue));
    let worker = tokio::spawn(runner::run_worker(ctx, Arc::clone(&queue)));

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    worker.abort();
    Ok(())
}

/// Log a session, mirror it into the free-text memory, then run the
/// post-session analysis inline (mastery update + threat cache refresh).
#[allow(clippy::too_many_arguments)]
async fn log_session(
    ctx: &AppContext,
    user: &str,
    subject: &str,
    topic: Option<String>,
    minutes: i64,
    effectiveness: Option<i64>,
    notes: Option<String>,
) -> Result<()> {
    if minutes < 0 {
        return Err(IntelError::InvalidRange {
            field: "minutes",
            min: 0,
            max: i64::MAX,
            value: minutes,
        }
        .into());
    }
    if let Some(eff) = effectiveness {
        if !(1..=10).contains(&eff) {
            return Err(IntelError::InvalidRange {
                field: "effectiveness",
                min: 1,
                max: 10,
                value: eff,
            }
            .into());
        }
    }
    ctx.storage
        .get_user(user)
        .await?
        .ok_or_else(|| IntelError::NotFound {
            entity: "user",
            id: user.to_string(),
        })?;

    let session = ctx
        .storage
        .create_session(
            user,
            subject,
            topic.as_deref(),
            minutes,
            effectiveness,
            notes.as_deref(),
        )
        .await?;

    let memory_text = format!(
        "Studied {subject}{} for {minutes} minutes{}",
        topic.as_deref()
            .map(|t| format!(" - {t}"))
            .unwrap_or_default(),
        notes
            .as_deref()
            .map(|n| format!(". Notes: {n}"))
            .unwrap_or_default(),
    );
    ctx.storage
        .record_event(user, "study_session_complete", &memory_text)
        .await?;

    let update = mastery::apply_session(&ctx.storage, &session).await?;
    refresh_exam_threats(&ctx.storage, user).await?;

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "session": session,
            "mastery": update,
        }))?
    );
    Ok(())
}

async fn run_exam_action(ctx: &AppContext, action: ExamAction) -> Result<()> {
    match action {
        ExamAction::Add {
            user,
            subject,
            topic,
            date,
            weight,
            target_grade,
        } => {
            let date = parse_exam_date(&date)?;
            let exam = ctx
                .storage
                .create_exam(
                    &user,
                    &subject,
                    topic.as_deref(),
                    date,
                    weight,
                    target_grade.as_deref(),
                )
                .await?;
            refresh_exam_threats(&ctx.storage, &user).await?;
            println!("{}", serde_json::to_string_pretty(&exam)?);
            Ok(())
        }
        ExamAction::List { user } => {
            let threats = refresh_exam_threats(&ctx.storage, &user).await?;
            println!("{}", serde_json::to_string_pretty(&threats)?);
            Ok(())
        }
        ExamAction::Set {
            user,
            id,
            subject,
            topic,
            date,
            weight,
            target_grade,
        } => {
            let date = match date {
                Some(raw) => Some(parse_exam_date(&raw)?),
                None => None,
            };
            let updated = ctx
                .storage
                .update_exam(
                    &id,
                    &user,
                    subject.as_deref(),
                    topic.as_deref(),
                    date,
                    weight,
                    target_grade.as_deref(),
                )
                .await?;
            if !updated {
                return Err(IntelError::NotFound {
                    entity: "exam",
                    id,
                }
                .into());
            }
            refresh_exam_threats(&ctx.storage, &user).await?;
            println!("updated {id}");
            Ok(())
        }
        ExamAction::Rm { user, id } => {
            let deleted = ctx.storage.delete_exam(&id, &user).await?;
            if !deleted {
                return Err(IntelError::NotFound {
                    entity: "exam",
                    id,
                }
                .into());
            }
            println!("deleted {id}");
            Ok(())
        }
    }
}
