use anyhow::{Context, Result};
use clap::Parser;
use uuid::Uuid;

use cas_cli::api_client::ApiClient;
use cas_cli::{init_tracing, truncate_string};
use cas_core::models::{ProcessingStatus, SubmissionStats, SubmissionSummary};

#[derive(Parser, Debug)]
#[command(name = "submission_stats")]
#[command(about = "Show CRM submission outbox statistics and failed submissions")]
struct Args {
    /// Also list submissions in this processing status
    #[arg(long, value_name = "STATUS")]
    status: Option<ProcessingStatus>,

    /// Restrict the listing to one form
    #[arg(long, value_name = "FORM")]
    form: Option<String>,

    /// Maximum number of submissions to list
    #[arg(long, default_value = "20")]
    limit: i64,

    /// Re-queue a failed submission before printing stats
    #[arg(long, value_name = "UUID")]
    retry: Option<Uuid>,

    /// Output format: json or table (default: table)
    #[arg(long, default_value = "table")]
    format: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let client = ApiClient::from_env()?;

    if let Some(id) = args.retry {
        client
            .retry_submission(id)
            .await
            .with_context(|| format!("Failed to re-queue submission {}", id))?;
        tracing::info!(submission_id = %id, "Submission re-queued");
    }

    let stats = client.get_stats().await?;
    let submissions = match args.status {
        Some(status) => Some(
            client
                .list_submissions(Some(status), args.form.as_deref(), args.limit)
                .await?,
        ),
        None => None,
    };

    match args.format.as_str() {
        "json" => {
            let out = serde_json::json!({ "stats": stats, "submissions": submissions });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        _ => {
            print_stats_table(&stats);
            if let Some(submissions) = submissions {
                print_submissions_table(&submissions);
            }
        }
    }

    Ok(())
}

fn print_stats_table(stats: &SubmissionStats) {
    println!("\n=== Submission Outbox ===\n");
    println!("Total submissions:  {}", stats.total);
    println!("In flight:          {}", stats.in_flight);
    println!("Max retries:        {}", stats.max_retries);
    println!();
    println!("{:<20} {:>10}", "Processing", "Count");
    println!("{}", "-".repeat(31));
    println!("{:<20} {:>10}", "pending", stats.pending);
    println!("{:<20} {:>10}", "processing", stats.processing);
    println!("{:<20} {:>10}", "completed", stats.completed);
    println!("{:<20} {:>10}", "failed", stats.failed);
    println!("{:<20} {:>10}", "  retry scheduled", stats.eligible_for_retry);
    println!("{:<20} {:>10}", "  retries exhausted", stats.exhausted_retries);
    println!();
    println!("{:<20} {:>10}", "CRM sync", "Count");
    println!("{}", "-".repeat(31));
    println!("{:<20} {:>10}", "not_synced", stats.not_synced);
    println!("{:<20} {:>10}", "synced", stats.synced);
    println!("{:<20} {:>10}", "sync_failed", stats.sync_failed);

    if !stats.by_form.is_empty() {
        println!();
        println!("{:<20} {:>10}", "Form", "Count");
        println!("{}", "-".repeat(31));
        for form in &stats.by_form {
            println!("{:<20} {:>10}", truncate_string(&form.form_name, 20), form.count);
        }
    }
    println!();
}

fn print_submissions_table(submissions: &[SubmissionSummary]) {
    if submissions.is_empty() {
        println!("No matching submissions.\n");
        return;
    }

    println!(
        "{:<36}  {:<16}  {:<11}  {:>7}  {}",
        "ID", "Form", "Status", "Retries", "Last error"
    );
    println!("{}", "-".repeat(100));
    for s in submissions {
        println!(
            "{:<36}  {:<16}  {:<11}  {:>3}/{:<3}  {}",
            s.id,
            truncate_string(&s.form_name, 16),
            s.processing_status,
            s.retry_count,
            s.max_retries,
            truncate_string(s.last_error.as_deref().unwrap_or("-"), 30)
        );
    }
    println!();
}
