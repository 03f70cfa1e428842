use std::env;
use std::error::Error;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tempus_sync::adapters::outbound::ClockifyAdapter;
use tempus_sync::domain::models::{
    CandidateRow, Progress, ProjectRef, TagsRef, UserId, WorkspaceId,
};
use tempus_sync::domain::services::{EntryWriter, IntakeWorkflow, DEFAULT_PREVIEW_ROWS};
use tempus_sync::rate_limit::{RateLimitPolicy, RateLimiter};

const ZONE: &str = "Europe/Stockholm";

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let api_key = env::var("CLOCKIFY_API_KEY")?;
    let workspace = WorkspaceId::from(env::var("CLOCKIFY_WORKSPACE_ID")?);

    let credentials = clockify::Credentials::new(api_key)?;
    let adapter = Arc::new(ClockifyAdapter::new(credentials));
    let user = adapter.current_user_id().await?;
    println!("Authenticated as user {}", user);

    let writer = EntryWriter::new(
        Arc::clone(&adapter),
        Arc::clone(&adapter),
        workspace,
        user,
        ZONE,
        Arc::new(RateLimiter::new(RateLimitPolicy::default())),
        adapter.credential_key(),
    );

    // A small batch of local wall-clock rows, as a CSV import would yield.
    let rows = vec![
        CandidateRow::new("2024-05-06T09:00")
            .with_end("2024-05-06T09:30")
            .with_description("Standup")
            .with_project(ProjectRef::ByName("Internal".to_string()))
            .with_tags(TagsRef::Names(vec!["meeting".to_string()])),
        CandidateRow::new("2024-05-06T09:30")
            .with_end("2024-05-06T12:00")
            .with_description("Sync engine review")
            .with_project(ProjectRef::ByName("Internal".to_string())),
    ];

    let mut flow = IntakeWorkflow::new(writer, rows);

    let projects = flow.verify_projects().await?;
    if !projects.is_complete() {
        println!("Creating {} missing projects...", projects.missing.len());
        flow.create_missing_projects(&projects.missing).await?;
        flow.verify_projects().await?;
    }

    flow.verify_tasks().await?;

    let (tags, preview) = flow.verify_tags(DEFAULT_PREVIEW_ROWS).await?;
    if !tags.is_complete() {
        println!("Creating {} missing tags...", tags.missing.len());
        flow.create_missing_tags(&tags.missing).await?;
        flow.verify_tags(DEFAULT_PREVIEW_ROWS).await?;
    }

    println!("Preview:");
    for row in &preview {
        let marker = if row.problems.is_empty() { "ok" } else { "!!" };
        println!(
            "  [{}] {:<30} {:?} -> {:?}",
            marker,
            row.description.as_deref().unwrap_or("(no description)"),
            row.start,
            row.end,
        );
        for problem in &row.problems {
            println!("       problem: {}", problem);
        }
    }

    let cancel = AtomicBool::new(false);
    let mut on_progress = |p: Progress| {
        println!("  committed {}/{}", p.completed, p.total);
    };
    let outcome = flow.commit(&cancel, Some(&mut on_progress)).await?;

    println!(
        "Done: {} created, {} updated, {} failed, {} skipped",
        outcome.created,
        outcome.updated,
        outcome.failed.len(),
        outcome.skipped
    );
    Ok(())
}
