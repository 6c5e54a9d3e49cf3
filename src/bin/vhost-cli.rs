use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "vhost-cli")]
#[command(about = "Management CLI for vhost-router", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, env = "VHOST_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server status
    Status,
    /// List hosts and virtual hosts
    Hosts,
    /// Print a host's route table
    Routes {
        /// Host name; the default host when omitted
        #[arg(long)]
        host: Option<String>,
        /// Print every route attribute
        #[arg(long)]
        full: bool,
    },
    /// List registered actions
    Actions,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    match cli.command {
        Commands::Status => {
            let res = client
                .get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_json(res).await?;
        }
        Commands::Hosts => {
            let res = client
                .get(format!("{}/admin/hosts", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_json(res).await?;
        }
        Commands::Routes { host, full } => {
            let mut query = vec![("full", full.to_string())];
            if let Some(host) = host {
                query.push(("host", host));
            }
            let res = client
                .get(format!("{}/admin/routes", cli.url))
                .query(&query)
                .headers(headers)
                .send()
                .await?;
            if check_status(&res) {
                println!("{}", res.text().await?);
            } else {
                print_error(res).await;
            }
        }
        Commands::Actions => {
            let res = client
                .get(format!("{}/admin/actions", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_json(res).await?;
        }
    }

    Ok(())
}

fn check_status(res: &reqwest::Response) -> bool {
    res.status().is_success()
}

async fn print_error(res: reqwest::Response) {
    eprintln!("Error: Admin API returned status {}", res.status());
    if let Ok(text) = res.text().await {
        eprintln!("Response: {}", text);
    }
}

async fn print_json(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    if !check_status(&res) {
        print_error(res).await;
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
