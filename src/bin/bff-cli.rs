use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Map, Value};

#[derive(Parser)]
#[command(name = "bff-cli")]
#[command(about = "Management CLI for the bff-dispatch gateway", long_about = None)]
struct Cli {
    /// Admin API base URL.
    #[arg(short, long, default_value = "http://127.0.0.1:4001", env = "BFF_ADMIN_URL")]
    url: String,

    /// Admin API key.
    #[arg(short, long, default_value = "", env = "BFF_ADMIN_KEY")]
    key: String,

    /// Front-door base URL, used by `call`.
    #[arg(long, default_value = "http://127.0.0.1:4000", env = "BFF_GATEWAY_URL")]
    gateway: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway status
    Status,
    /// Show circuit breaker state per service
    Breakers,
    /// Inspect the response cache
    Cache,
    /// List registered services and endpoints
    Services,
    /// Dispatch a call through the gateway
    Call {
        service: String,
        endpoint: String,
        /// Positional path arguments.
        args: Vec<String>,
        /// Query parameter as key=value; repeatable.
        #[arg(short, long = "query", value_parser = parse_pair)]
        query: Vec<(String, String)>,
        /// JSON request body.
        #[arg(short, long)]
        body: Option<String>,
        /// Overall call timeout in milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", raw))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", cli.key))?);

    let admin_path = match &cli.command {
        Commands::Status => "status",
        Commands::Breakers => "breakers",
        Commands::Cache => "cache",
        Commands::Services => "services",
        Commands::Call {
            service,
            endpoint,
            args,
            query,
            body,
            timeout_ms,
        } => {
            let mut options = Map::new();
            if !query.is_empty() {
                let query = query
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect();
                options.insert("query".into(), Value::Object(query));
            }
            if let Some(body) = body {
                options.insert("body".into(), serde_json::from_str::<Value>(body)?);
            }
            if let Some(timeout_ms) = timeout_ms {
                options.insert("timeout_ms".into(), json!(timeout_ms));
            }

            let res = client
                .post(format!("{}/dispatch", cli.gateway))
                .json(&json!({
                    "service": service,
                    "endpoint": endpoint,
                    "args": args,
                    "options": options,
                }))
                .send()
                .await?;
            return print_response(res).await;
        }
    };

    let res = client
        .get(format!("{}/admin/{}", cli.url, admin_path))
        .headers(headers)
        .send()
        .await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let rendered = match serde_json::from_str::<Value>(&text) {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => text,
    };

    if status.is_success() {
        println!("{}", rendered);
    } else {
        eprintln!("Error: gateway returned status {}", status);
        eprintln!("{}", rendered);
    }
    Ok(())
}
