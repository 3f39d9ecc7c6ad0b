use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "lb-cli")]
#[command(about = "Management CLI for the adaptive load balancer", long_about = None)]
struct Cli {
    #[arg(short, long, env = "LB_ADMIN_URL", default_value = "http://127.0.0.1:8081")]
    url: String,

    /// Bearer token, when the admin API requires one.
    #[arg(short, long, env = "LB_ADMIN_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show routing algorithm, reason and decision log
    Status,
    /// List backend liveness, connections and latency
    Backends,
    /// Register a new backend
    Add {
        address: String,
        #[arg(short, long, default_value_t = 1)]
        weight: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.key {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);
    }

    let res = match cli.command {
        Commands::Status => {
            client
                .get(format!("{}/status", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Backends => {
            client
                .get(format!("{}/metrics", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Add { address, weight } => {
            client
                .post(format!("{}/admin/add", cli.url))
                .headers(headers)
                .json(&json!({ "address": address, "weight": weight }))
                .send()
                .await?
        }
    };
    print_response(res).await?;

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
