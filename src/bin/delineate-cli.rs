use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "delineate-cli")]
#[command(about = "Command-line client for the delineate dashboard", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8090", env = "DELINEATE_DASHBOARD_URL")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show dashboard version and telemetry state
    Status,
    /// Print the full dashboard snapshot
    Dashboard,
    /// Show the latest API health check
    Health,
    /// List download jobs, newest first
    Jobs,
    /// Start a download job
    Download {
        file_id: String,
        /// Poll the job until it completes or fails
        #[arg(short, long)]
        follow: bool,
    },
    /// Check whether a file is available
    Check { file_id: String },
    /// Trigger the error-tracking probe
    TestError,
    /// Show recent request failures
    Errors,
    /// Show trace viewer and error-tracking links
    Links,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    delineate_dashboard::observability::logging::init_basic("delineate_cli=info");

    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Status => {
            let res = client.get(format!("{base}/api/status")).send().await?;
            print_response(res).await?;
        }
        Commands::Dashboard => {
            let res = client.get(format!("{base}/api/dashboard")).send().await?;
            print_response(res).await?;
        }
        Commands::Health => {
            let res = client.get(format!("{base}/api/health")).send().await?;
            print_response(res).await?;
        }
        Commands::Jobs => {
            let res = client.get(format!("{base}/api/jobs")).send().await?;
            print_response(res).await?;
        }
        Commands::Download { file_id, follow } => {
            let res = client
                .post(format!("{base}/api/jobs"))
                .json(&json!({ "file_id": file_id }))
                .send()
                .await?;
            let Some(job) = print_response(res).await? else {
                return Ok(());
            };
            if follow {
                follow_job(&client, base, &job).await?;
            }
        }
        Commands::Check { file_id } => {
            let res = client
                .post(format!("{base}/api/downloads/check"))
                .json(&json!({ "file_id": file_id }))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::TestError => {
            let res = client
                .post(format!("{base}/api/error-tracking/test"))
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Errors => {
            let res = client.get(format!("{base}/api/errors")).send().await?;
            print_response(res).await?;
        }
        Commands::Links => {
            let res = client.get(format!("{base}/api/links")).send().await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn follow_job(
    client: &reqwest::Client,
    base: &str,
    job: &Value,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(id) = job["id"].as_str() else {
        return Ok(());
    };
    let mut status = job["status"].as_str().unwrap_or_default().to_string();

    while status == "pending" || status == "processing" {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let current: Value = client
            .get(format!("{base}/api/jobs/{id}"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        status = current["status"].as_str().unwrap_or_default().to_string();
        tracing::info!(
            status = %status,
            progress = current["progress"].as_u64().unwrap_or(0),
            "Job {id}"
        );
        if status == "completed" || status == "failed" {
            println!("{}", serde_json::to_string_pretty(&current)?);
        }
    }
    Ok(())
}

/// Print a successful JSON body to stdout and return it; errors go to stderr.
async fn print_response(res: reqwest::Response) -> Result<Option<Value>, Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: dashboard returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(None);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(Some(json))
}
