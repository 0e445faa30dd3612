use anyhow::Result;
use clap::Parser;

use cas_cli::api_client::{ApiClient, ProvisioningReport};
use cas_cli::init_tracing;

#[derive(Parser, Debug)]
#[command(name = "provision_workflows")]
#[command(about = "Create the Zoho CRM notification workflows through the CAS API")]
struct Args {
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

    let report = client.provision_workflows().await?;

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print_report(&report),
    }

    if !report.errors.is_empty() {
        return Err(anyhow::anyhow!(
            "{} of {} workflows failed",
            report.errors.len(),
            report.errors.len() + report.created.len()
        ));
    }

    Ok(())
}

fn print_report(report: &ProvisioningReport) {
    println!("\n=== Zoho CRM Workflows ===\n");
    for created in &report.created {
        println!(
            "created  {:<32}  notification={}  rule={}",
            created.workflow, created.email_notification_id, created.workflow_rule_id
        );
    }
    for error in &report.errors {
        println!("failed   {:<32}  {}", error.workflow, error.error);
    }
    println!();
}
