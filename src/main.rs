use std::sync::Arc;
use std::time::Duration;
use anyhow::{anyhow, Context};
use clap::Parser;
use course_client::domain::{FileCredentialStore, Session};
use course_client::protocol::http::{AuthClient, ClientConfig};
use course_client::shell::{self, Command, ConsoleShell};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = shell::Args::parse();

    let log_config = format!("course_client={}", args.log_level);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_config))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: shell::Args) -> anyhow::Result<()> {
    let mut config = ClientConfig::builder()
        .base_url(args.base_url)
        .guard_window(Duration::from_millis(args.guard_window_ms))
        .no_proxy(args.no_proxy);
    if let Some(ca_cert) = args.ca_cert {
        config = config.root_certificate(ca_cert);
    }
    let config = config.build()?;

    let store = Arc::new(FileCredentialStore::new(args.store));
    let session = Session::restore(store).context("failed to read stored credentials")?;
    let client = AuthClient::with_reqwest(config, session, Arc::new(ConsoleShell), Arc::new(ConsoleShell))?;

    match args.command {
        Command::Login { username, password } => {
            client.login(&username, &password).await?;
            eprintln!("Logged in as {}", username);
        }
        Command::Logout => client.logout(),
        Command::Send { method, path, body, headers } => {
            let method = Method::from_bytes(method.to_uppercase().as_bytes())?;
            let body: Option<serde_json::Value> = body
                .map(|body| serde_json::from_str(&body))
                .transpose()
                .context("--body is not valid JSON")?;
            let headers = parse_headers(&headers)?;

            let response = client.send(method, &path, body, Some(headers)).await?;
            println!("{}", response.text());
        }
    }

    Ok(())
}

fn parse_headers(raw: &[String]) -> anyhow::Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for header in raw {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| anyhow!("header {:?} is not `name: value`", header))?;
        headers.append(
            HeaderName::from_bytes(name.trim().as_bytes())?,
            HeaderValue::from_str(value.trim())?,
        );
    }
    Ok(headers)
}
