use std::fmt::Display;
use std::path::PathBuf;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "course-client", about = "Authenticated client for the course API")]
pub struct Args {
    #[arg(long, value_enum, default_value = "warn")]
    pub log_level: LogLevel,

    /// Origin of the course API
    #[arg(long, env = "COURSE_API_URL", default_value = "http://127.0.0.1:8000")]
    pub base_url: String,

    /// File holding the credential pair between runs
    #[arg(long, env = "COURSE_CLIENT_STORE", default_value = ".course-client/session.json")]
    pub store: PathBuf,

    /// Extra trusted root certificate (PEM)
    #[arg(long)]
    pub ca_cert: Option<PathBuf>,

    /// Treat access tokens as expired this many milliseconds early
    #[arg(long, default_value_t = 1000)]
    pub guard_window_ms: u64,

    #[arg(long)]
    pub no_proxy: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Obtain a credential pair and store it
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "COURSE_CLIENT_PASSWORD")]
        password: String,
    },
    /// Forget the stored credential pair
    Logout,
    /// Issue a request relative to the base url and print the body
    Send {
        method: String,
        path: String,
        /// JSON request body
        #[arg(long)]
        body: Option<String>,
        /// Extra header as `name: value`, repeatable
        #[arg(long = "header")]
        headers: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_with_headers() {
        let args = Args::try_parse_from([
            "course-client",
            "--base-url",
            "https://learn.example",
            "send",
            "GET",
            "api/resources/?category=video",
            "--header",
            "Accept-Language: en",
        ])
        .unwrap();

        assert_eq!(args.base_url, "https://learn.example");
        match args.command {
            Command::Send { method, path, body, headers } => {
                assert_eq!(method, "GET");
                assert_eq!(path, "api/resources/?category=video");
                assert!(body.is_none());
                assert_eq!(headers, vec!["Accept-Language: en".to_string()]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
