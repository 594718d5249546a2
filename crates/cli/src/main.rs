//! Courier - issue one HTTP request from the command line.

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use courier::{BodyParser, DecodedBody, HttpClient, Method, RequestBody, Response};

/// Courier - send an HTTP request and print the decoded response
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// URL, or path when --base-url is given
    url: String,

    /// Request method
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Base URL that the positional URL is joined onto
    #[arg(long)]
    base_url: Option<String>,

    /// Request header as NAME:VALUE (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Query parameter as KEY=VALUE (repeatable)
    #[arg(short, long = "query")]
    queries: Vec<String>,

    /// Raw request body
    #[arg(short, long, conflicts_with = "json")]
    data: Option<String>,

    /// JSON request body
    #[arg(long)]
    json: Option<String>,

    /// Maximum redirects to follow
    #[arg(long, default_value = "1")]
    redirects: u32,

    /// Body parser: auto, json, text or raw
    #[arg(long, default_value = "auto")]
    parser: BodyParser,

    /// Print response headers
    #[arg(short = 'i', long)]
    include: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn split_pair(raw: &str, separator: char) -> Result<(String, String)> {
    let (key, value) = raw
        .split_once(separator)
        .ok_or_else(|| anyhow!("expected `{}` in {:?}", separator, raw))?;
    Ok((key.trim().to_string(), value.trim().to_string()))
}

fn print_response(response: &Response, include_headers: bool) {
    for hop in response.redirects() {
        println!("> {} {} -> {}", hop.status_code(), hop.status_message(), hop.url());
    }
    println!("{} {} {}", response.method(), response.status_code(), response.status_message());
    if include_headers {
        print!("{}", response.headers());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let method: Method = args
        .method
        .to_uppercase()
        .parse()
        .with_context(|| format!("invalid method {:?}", args.method))?;

    let mut builder = HttpClient::builder()
        .redirects(args.redirects)
        .body_parser(args.parser);
    if let Some(base_url) = &args.base_url {
        builder = builder.base_url(base_url);
    }
    let client = builder.build()?;

    let mut request = client.request_with(method, &args.url);
    for raw in &args.headers {
        let (name, value) = split_pair(raw, ':')?;
        request = request.header(name, value);
    }
    for raw in &args.queries {
        let (key, value) = split_pair(raw, '=')?;
        request = request.query(key, value);
    }
    if let Some(data) = args.data {
        request = request.body(RequestBody::from(data));
    }
    if let Some(json) = args.json {
        let value: serde_json::Value =
            serde_json::from_str(&json).context("--json is not valid JSON")?;
        request = request.json(value);
    }

    info!("Sending request to {}", client.resolve_url(&args.url));
    let response = request.send().await?;
    print_response(&response, args.include);

    match response.body().await? {
        DecodedBody::Null => {}
        DecodedBody::Json(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        DecodedBody::Text(text) => println!("{}", text),
        DecodedBody::Raw(bytes) => println!("{}", String::from_utf8_lossy(&bytes)),
    }

    if response.is_client_error() || response.is_server_error() {
        bail!("request failed with status {}", response.status_code());
    }

    Ok(())
}
