//! CLI administration tool for news-aggregator.
//!
//! Provides commands for managing API tokens and users, viewing statistics,
//! checking the database and running pipeline stages by hand, without going
//! through the HTTP API.
//!
//! # Usage
//!
//! ```bash
//! # Issue an API token for a user
//! cargo run --bin admin -- token create --user alice@example.com
//!
//! # List and revoke tokens
//! cargo run --bin admin -- token list
//! cargo run --bin admin -- token revoke "ci"
//!
//! # Grant admin rights
//! cargo run --bin admin -- user promote alice@example.com
//!
//! # Run pipeline stages in the foreground
//! cargo run --bin admin -- pipeline scrape-pending --follow
//! cargo run --bin admin -- pipeline validate-links --dry-run
//! ```
//!
//! # Environment Variables
//!
//! The same variables as the server (see `news_aggregator::config`); at
//! minimum `DATABASE_URL`, `TOKEN_SIGNING_SECRET` and `ENCRYPTION_KEY`.

use news_aggregator::application::scheduler::PeriodicJob;
use news_aggregator::application::worker::{TaskHandler, TaskQueue};
use news_aggregator::config;
use news_aggregator::domain::repositories::{SessionRepository, UserRepository};
use news_aggregator::domain::task::Task;
use news_aggregator::infrastructure::cache::NullCache;
use news_aggregator::infrastructure::persistence::{PgSessionRepository, PgUserRepository};
use news_aggregator::server::{build_providers, connect_pool};
use news_aggregator::state::{AppState, PgPipeline};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::{Confirm, Input};
use sqlx::PgPool;
use std::collections::VecDeque;
use std::sync::Arc;

/// CLI tool for managing news-aggregator.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage API tokens
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },

    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Show pipeline statistics
    Stats,

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },

    /// Run pipeline stages in the foreground
    Pipeline {
        #[command(subcommand)]
        action: PipelineAction,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Issue a bearer token for a user
    Create {
        /// Email of the token owner
        #[arg(short, long)]
        user: Option<String>,

        /// Token name (e.g., "ci", "notebook")
        #[arg(short, long)]
        name: Option<String>,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// List tokens and sessions
    List {
        /// Only show tokens of this user id
        #[arg(short, long)]
        user_id: Option<i64>,
    },

    /// Revoke a token
    Revoke {
        /// Token name or ID to revoke
        name_or_id: String,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// List users
    List,

    /// Grant admin rights
    Promote {
        /// User email
        email: String,
    },

    /// Revoke admin rights
    Demote {
        /// User email
        email: String,
    },
}

#[derive(Subcommand)]
enum DbAction {
    /// Check database connection
    Check,

    /// Show database info
    Info,
}

#[derive(Subcommand)]
enum PipelineAction {
    /// Fetch new newsletters for one user or every Gmail-connected user
    SyncEmails {
        /// Only this user id
        #[arg(short, long)]
        user_id: Option<i64>,

        /// Also run follow-up tasks (link processing, scraping, ...)
        #[arg(short, long)]
        follow: bool,
    },

    /// Scrape the next batch of pending articles
    ScrapePending {
        #[arg(short, long)]
        follow: bool,
    },

    /// Embed scraped articles that have no embedding yet
    EmbedMissing {
        #[arg(short, long)]
        follow: bool,
    },

    /// Re-run the article heuristic over stored links
    ValidateLinks {
        /// Report changes without writing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Recompute cluster centroids and statistics
    RefreshClusters,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = config::load_from_env()?;
    let pool = connect_pool(&config).await?;

    match cli.command {
        Commands::Token { action } => handle_token_action(action, &pool, &config).await?,
        Commands::User { action } => handle_user_action(action, &pool).await?,
        Commands::Stats => handle_stats(&pool).await?,
        Commands::Db { action } => handle_db_action(action, &pool).await?,
        Commands::Pipeline { action } => handle_pipeline_action(action, pool, &config).await?,
    }

    Ok(())
}

/// Builds the full service graph. The task queue is never drained here;
/// pipeline commands run tasks inline instead.
fn app_state(pool: PgPool, config: &config::Config) -> Result<AppState> {
    let providers = build_providers(config)?;
    let (queue, _rx) = TaskQueue::new(1);
    Ok(AppState::new(
        Arc::new(pool),
        config,
        providers,
        Arc::new(NullCache::new()),
        queue,
    ))
}

async fn handle_token_action(
    action: TokenAction,
    pool: &PgPool,
    config: &config::Config,
) -> Result<()> {
    let sessions = PgSessionRepository::new(Arc::new(pool.clone()));

    match action {
        TokenAction::Create { user, name, yes } => {
            let state = app_state(pool.clone(), config)?;
            let users = PgUserRepository::new(Arc::new(pool.clone()));
            create_token(&state, &users, user, name, yes).await?;
        }
        TokenAction::List { user_id } => list_tokens(&sessions, user_id).await?,
        TokenAction::Revoke { name_or_id } => revoke_token(&sessions, name_or_id).await?,
    }

    Ok(())
}

/// Issues a bearer token for an existing user.
///
/// Only the HMAC of the token is stored; the raw value is shown once.
async fn create_token(
    state: &AppState,
    users: &PgUserRepository,
    email: Option<String>,
    name: Option<String>,
    skip_confirm: bool,
) -> Result<()> {
    println!("{}", "🔑 Create API Token".bright_blue().bold());
    println!();

    let email = match email {
        Some(e) => e,
        None => Input::new().with_prompt("User email").interact_text()?,
    };
    let user = users
        .find_by_email(&email)
        .await
        .map_err(|e| anyhow::anyhow!("Database error: {}", e))?
        .context("User not found (users are created on first Google sign-in)")?;

    let token_name = match name {
        Some(n) => n,
        None => Input::new()
            .with_prompt("Token name")
            .with_initial_text("cli")
            .interact_text()?,
    };

    println!("  User:  {} (#{})", user.email.cyan(), user.id);
    println!("  Name:  {}", token_name.cyan());
    println!();

    if !skip_confirm {
        let confirmed = Confirm::new()
            .with_prompt("Create this token?")
            .default(true)
            .interact()?;

        if !confirmed {
            println!("{}", "❌ Cancelled".red());
            return Ok(());
        }
    }

    let (session, token) = state
        .auth_service
        .issue_token(user.id, &token_name, None)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create token: {}", e))?;

    println!();
    println!("{}", "✅ Token created successfully!".green().bold());
    println!("  ID:    {}", session.id.to_string().bright_black());
    println!("  Token: {}", token.bright_yellow().bold());
    println!();
    println!(
        "{}",
        "⚠️  IMPORTANT: Save this token now! You won't be able to see it again."
            .red()
            .bold()
    );
    println!();
    println!("{}", "Add this to your requests:".bright_white());
    println!(
        "  {}: Bearer {}",
        "Authorization".bright_cyan(),
        token.bright_yellow()
    );
    println!();

    Ok(())
}

/// Lists sessions and tokens with status indicators.
async fn list_tokens(sessions: &PgSessionRepository, user_id: Option<i64>) -> Result<()> {
    println!("{}", "📋 Tokens".bright_blue().bold());
    println!();

    let tokens = sessions
        .list(user_id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list tokens: {}", e))?;

    if tokens.is_empty() {
        println!("{}", "  No tokens found".yellow());
        return Ok(());
    }

    println!(
        "  {:<5} {:<6} {:<24} {:<17} {:<17} {:<10}",
        "ID".bright_white().bold(),
        "User".bright_white().bold(),
        "Name".bright_white().bold(),
        "Created".bright_white().bold(),
        "Last used".bright_white().bold(),
        "Status".bright_white().bold()
    );
    println!("  {}", "─".repeat(85).bright_black());

    let now = chrono::Utc::now();
    for token in &tokens {
        let status = if token.revoked_at.is_some() {
            "REVOKED".red()
        } else if token.is_usable(now) {
            "ACTIVE".green()
        } else {
            "EXPIRED".yellow()
        };
        let last_used = token
            .last_used_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());

        println!(
            "  {:<5} {:<6} {:<24} {:<17} {:<17} {}",
            token.id.to_string().bright_black(),
            token.user_id.to_string().bright_black(),
            token.name.cyan(),
            token.created_at.format("%Y-%m-%d %H:%M").to_string().bright_black(),
            last_used.bright_black(),
            status
        );
    }

    println!();
    println!("  Total: {}", tokens.len().to_string().bright_white().bold());
    println!();

    Ok(())
}

/// Revokes a token by name or ID with confirmation prompt.
async fn revoke_token(sessions: &PgSessionRepository, name_or_id: String) -> Result<()> {
    println!("{}", "🔒 Revoke Token".bright_blue().bold());
    println!();

    let token = match name_or_id.parse::<i64>() {
        Ok(id) => sessions.find_by_id(id).await,
        Err(_) => sessions.find_by_name(&name_or_id).await,
    }
    .map_err(|e| anyhow::anyhow!("Database error: {}", e))?
    .context("Token not found")?;

    if token.revoked_at.is_some() {
        println!("{}", "⚠️  This token is already revoked".yellow());
        return Ok(());
    }

    println!("  Token: {}", token.name.cyan());
    println!("  ID:    {}", token.id.to_string().bright_black());
    println!();

    let confirmed = Confirm::new()
        .with_prompt("Revoke this token?")
        .default(false)
        .interact()?;

    if !confirmed {
        println!("{}", "❌ Cancelled".red());
        return Ok(());
    }

    sessions
        .revoke(token.id)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to revoke token: {}", e))?;

    println!("{}", "✅ Token revoked successfully!".green().bold());
    Ok(())
}

async fn handle_user_action(action: UserAction, pool: &PgPool) -> Result<()> {
    let users = PgUserRepository::new(Arc::new(pool.clone()));

    match action {
        UserAction::List => {
            println!("{}", "👥 Users".bright_blue().bold());
            println!();

            let all = users
                .list(0, i64::MAX)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to list users: {}", e))?;

            for user in &all {
                let mut flags = Vec::new();
                if user.is_admin {
                    flags.push("admin".magenta());
                }
                if user.gmail_connected {
                    flags.push("gmail".green());
                }
                if !user.is_active {
                    flags.push("inactive".red());
                }
                let flags: Vec<String> = flags.iter().map(ToString::to_string).collect();

                println!(
                    "  {:<5} {:<36} {:<24} {}",
                    user.id.to_string().bright_black(),
                    user.email.cyan(),
                    user.name,
                    flags.join(" ")
                );
            }

            println!();
            println!("  Total: {}", all.len().to_string().bright_white().bold());
        }
        UserAction::Promote { email } => set_admin(&users, &email, true).await?,
        UserAction::Demote { email } => set_admin(&users, &email, false).await?,
    }

    Ok(())
}

async fn set_admin(users: &PgUserRepository, email: &str, is_admin: bool) -> Result<()> {
    let user = users
        .find_by_email(email)
        .await
        .map_err(|e| anyhow::anyhow!("Database error: {}", e))?
        .context("User not found")?;

    users
        .set_admin(user.id, is_admin)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to update user: {}", e))?;

    let verb = if is_admin { "promoted to admin" } else { "demoted" };
    println!("{} {} {}", "✅".green(), user.email.cyan(), verb);
    Ok(())
}

/// Displays row counts for each pipeline stage.
async fn handle_stats(pool: &PgPool) -> Result<()> {
    println!("{}", "📊 Statistics".bright_blue().bold());
    println!();

    let rows: [(&str, &str); 8] = [
        ("Users", "SELECT COUNT(*) FROM users"),
        ("Emails", "SELECT COUNT(*) FROM newsletter_emails"),
        (
            "Article links",
            "SELECT COUNT(*) FROM extracted_links WHERE is_valid_article",
        ),
        ("Articles", "SELECT COUNT(*) FROM articles"),
        (
            "Embedded",
            "SELECT COUNT(*) FROM articles WHERE embedding IS NOT NULL",
        ),
        (
            "Active clusters",
            "SELECT COUNT(*) FROM topic_clusters WHERE is_active",
        ),
        ("Posts", "SELECT COUNT(*) FROM blog_posts"),
        (
            "Active tokens",
            "SELECT COUNT(*) FROM sessions WHERE revoked_at IS NULL \
             AND (expires_at IS NULL OR expires_at > NOW())",
        ),
    ];

    for (label, sql) in rows {
        let count: i64 = sqlx::query_scalar(sql).fetch_one(pool).await?;
        println!(
            "  {:<16} {}",
            format!("{label}:"),
            count.to_string().bright_green().bold()
        );
    }

    println!();
    println!("{}", "  Articles by scrape status".bright_white());
    let by_status: Vec<(String, i64)> = sqlx::query_as(
        "SELECT scrape_status::TEXT, COUNT(*) FROM articles GROUP BY 1 ORDER BY 1",
    )
    .fetch_all(pool)
    .await?;
    for (status, count) in by_status {
        println!("    {:<14} {}", status, count.to_string().bright_green());
    }

    println!();
    println!("{}", "  Generation jobs by status".bright_white());
    let jobs: Vec<(String, i64)> =
        sqlx::query_as("SELECT status::TEXT, COUNT(*) FROM generation_jobs GROUP BY 1 ORDER BY 1")
            .fetch_all(pool)
            .await?;
    for (status, count) in jobs {
        println!("    {:<14} {}", status, count.to_string().bright_green());
    }
    println!();

    Ok(())
}

async fn handle_db_action(action: DbAction, pool: &PgPool) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "🔍 Checking database connection...".bright_blue());

            sqlx::query("SELECT 1").fetch_one(pool).await?;

            println!("{}", "✅ Database connection OK".green().bold());
        }
        DbAction::Info => {
            println!("{}", "ℹ️  Database Information".bright_blue().bold());
            println!();

            let version: String = sqlx::query_scalar("SELECT version()")
                .fetch_one(pool)
                .await?;
            let size: String =
                sqlx::query_scalar("SELECT pg_size_pretty(pg_database_size(current_database()))")
                    .fetch_one(pool)
                    .await?;
            let migrations: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
                .fetch_one(pool)
                .await?;

            println!("  PostgreSQL: {}", version.bright_white());
            println!("  Size:       {}", size.bright_white());
            println!("  Migrations: {}", migrations.to_string().bright_white());
            println!();
        }
    }

    Ok(())
}

async fn handle_pipeline_action(
    action: PipelineAction,
    pool: PgPool,
    config: &config::Config,
) -> Result<()> {
    let state = app_state(pool, config)?;
    let pipeline = state.pipeline();

    match action {
        PipelineAction::SyncEmails { user_id, follow } => {
            let tasks = match user_id {
                Some(user_id) => vec![Task::FetchEmails {
                    user_id,
                    since: None,
                }],
                None => periodic(&pipeline, PeriodicJob::FetchAllUsers).await?,
            };
            run_tasks(&pipeline, tasks, follow).await;
        }
        PipelineAction::ScrapePending { follow } => {
            let tasks = periodic(&pipeline, PeriodicJob::ScrapePending).await?;
            run_tasks(&pipeline, tasks, follow).await;
        }
        PipelineAction::EmbedMissing { follow } => {
            let tasks = periodic(&pipeline, PeriodicJob::EmbedMissing).await?;
            run_tasks(&pipeline, tasks, follow).await;
        }
        PipelineAction::ValidateLinks { dry_run } => {
            let report = state
                .collector_service
                .revalidate_links(dry_run)
                .await
                .map_err(|e| anyhow::anyhow!("Link validation failed: {}", e))?;

            let suffix = if dry_run { " (dry run)" } else { "" };
            println!(
                "{} checked {}, changed {}{}",
                "✅".green(),
                report.checked.to_string().bright_white(),
                report.changed.to_string().bright_yellow(),
                suffix
            );
        }
        PipelineAction::RefreshClusters => {
            let centroids = state
                .cluster_service
                .recompute_centroids()
                .await
                .map_err(|e| anyhow::anyhow!("Centroid refresh failed: {}", e))?;
            let stats = state
                .cluster_service
                .refresh_statistics()
                .await
                .map_err(|e| anyhow::anyhow!("Statistics refresh failed: {}", e))?;

            println!(
                "{} centroids: {}, statistics: {}",
                "✅".green(),
                centroids.to_string().bright_white(),
                stats.to_string().bright_white()
            );
        }
    }

    Ok(())
}

async fn periodic(pipeline: &PgPipeline, job: PeriodicJob) -> Result<Vec<Task>> {
    let tasks = pipeline
        .run_periodic(job)
        .await
        .map_err(|e| anyhow::anyhow!("{} failed: {}", job.name(), e))?;
    println!(
        "{} {} produced {} task(s)",
        "▶".bright_blue(),
        job.name().cyan(),
        tasks.len()
    );
    Ok(tasks)
}

/// Runs tasks one at a time, without retries. Follow-ups are run too when
/// `follow` is set.
async fn run_tasks(pipeline: &PgPipeline, tasks: Vec<Task>, follow: bool) {
    let mut queue: VecDeque<Task> = tasks.into();
    let mut done = 0usize;
    let mut failed = 0usize;
    let mut skipped = 0usize;

    while let Some(task) = queue.pop_front() {
        match pipeline.handle(&task).await {
            Ok(follow_ups) => {
                done += 1;
                println!("  {} {}", "✓".green(), task.name());
                if follow {
                    queue.extend(follow_ups);
                } else {
                    skipped += follow_ups.len();
                }
            }
            Err(e) => {
                failed += 1;
                println!("  {} {}: {}", "✗".red(), task.name(), e);
                pipeline.on_failure(&task, &e).await;
            }
        }
    }

    println!();
    println!(
        "  Done: {}  Failed: {}  Follow-ups skipped: {}",
        done.to_string().green().bold(),
        failed.to_string().red().bold(),
        skipped.to_string().bright_black()
    );
}
