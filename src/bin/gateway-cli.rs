use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the recommendation gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Sent as X-Forwarded-For, selecting the rate-limit bucket.
    #[arg(long)]
    client: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show circuit state, in-flight calls and tracked clients
    Health,
    /// Request recommendations for a show
    Recommend {
        #[arg(long)]
        show: String,
        #[arg(long)]
        season: i64,
        #[arg(long, default_value_t = 3)]
        immersion: i64,
        #[arg(long, default_value = "en")]
        language: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if let Some(key) = &cli.client {
        headers.insert("x-forwarded-for", HeaderValue::from_str(key)?);
    }

    match cli.command {
        Commands::Health => {
            let res = client
                .get(format!("{}/health", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Recommend {
            show,
            season,
            immersion,
            language,
        } => {
            let body = json!({
                "showId": show,
                "targetSeason": season,
                "immersion": immersion,
                "language": language,
            });
            let res = client
                .post(format!("{}/recommendations", cli.url))
                .headers(headers)
                .json(&body)
                .send()
                .await?;
            print_response(res).await?;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let remaining = res
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let retry_after = res
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let text = res.text().await?;
    let rendered = match serde_json::from_str::<Value>(&text) {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => text,
    };

    if status.is_success() {
        println!("{rendered}");
    } else {
        eprintln!("Error: gateway returned status {status}");
        eprintln!("{rendered}");
    }
    if let Some(remaining) = remaining {
        eprintln!("Rate limit remaining: {remaining}");
    }
    if let Some(seconds) = retry_after {
        eprintln!("Retry after: {seconds}s");
    }
    Ok(())
}
