use adapter_core::{EchoHandler, Handler, ProcessHandler, ProcessHandlerConfig};
use adapter_http::ServerConfig;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "codex-adapter", version, about = "Session-oriented adapter service for agent runs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the adapter service
    Serve(ServeArgs),
    /// Send one prompt through a fresh session (test client)
    Call(CallArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum HandlerKind {
    /// Return every payload unchanged
    Echo,
    /// Run the agent program once per call
    Process,
}

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Bind address
    #[arg(long, env = "CODEX_ADAPTER_ADDRESS", default_value = "0.0.0.0:50051")]
    pub address: String,

    /// Maximum number of live sessions (0 = unlimited)
    #[arg(long, env = "CODEX_ADAPTER_MAX_SESSIONS", default_value_t = 100)]
    pub max_sessions: usize,

    /// Idle seconds before a session expires
    #[arg(long, env = "CODEX_ADAPTER_TTL_SECS", default_value_t = 1800)]
    pub ttl_secs: u64,

    /// Seconds between expiry sweeps
    #[arg(long, env = "CODEX_ADAPTER_SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub sweep_interval_secs: u64,

    /// Seconds an ended session is remembered before its id reports not-found
    #[arg(long, env = "CODEX_ADAPTER_TOMBSTONE_SECS", default_value_t = 600)]
    pub tombstone_secs: u64,

    #[arg(long, value_enum, env = "CODEX_ADAPTER_HANDLER", default_value = "process")]
    pub handler: HandlerKind,

    /// Agent program for the process handler
    #[arg(long, env = "CODEX_ADAPTER_PROGRAM", default_value = "codex")]
    pub program: PathBuf,

    /// Arguments for the agent program (repeatable); replaces the defaults when given
    #[arg(long = "program-arg", allow_hyphen_values = true)]
    pub program_args: Vec<String>,

    /// Per-call time limit for the agent program in seconds (0 = none)
    #[arg(long, env = "CODEX_ADAPTER_CALL_TIMEOUT_SECS", default_value_t = 0)]
    pub call_timeout_secs: u64,
}

impl ServeArgs {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::new(self.address.clone())
            .with_max_sessions((self.max_sessions > 0).then_some(self.max_sessions))
            .with_ttl(Duration::from_secs(self.ttl_secs))
            .with_sweep_interval(Duration::from_secs(self.sweep_interval_secs.max(1)))
            .with_tombstone_retention(Duration::from_secs(self.tombstone_secs))
    }

    pub fn build_handler(&self) -> Arc<dyn Handler> {
        match self.handler {
            HandlerKind::Echo => Arc::new(EchoHandler),
            HandlerKind::Process => {
                let mut config = ProcessHandlerConfig {
                    program: self.program.clone(),
                    ..Default::default()
                };
                if !self.program_args.is_empty() {
                    config.args = self.program_args.clone();
                }
                if self.call_timeout_secs > 0 {
                    config.timeout = Some(Duration::from_secs(self.call_timeout_secs));
                }
                Arc::new(ProcessHandler::new(config))
            }
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct CallArgs {
    /// Adapter base url
    #[arg(long, env = "CODEX_ADAPTER_URL", default_value = "http://localhost:50051")]
    pub url: String,

    /// Prompt sent to the agent
    #[arg(long)]
    pub prompt: String,

    /// Base instructions placed before the prompt
    #[arg(long)]
    pub instructions: Option<String>,

    /// Environment variable for the agent process, KEY=VALUE (repeatable)
    #[arg(long = "env", value_parser = parse_key_value)]
    pub env: Vec<(String, String)>,

    /// Model override passed to the agent
    #[arg(long)]
    pub model: Option<String>,
}

impl CallArgs {
    pub fn payload_data(&self) -> serde_json::Value {
        let env: serde_json::Map<String, serde_json::Value> = self
            .env
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();

        let mut data = serde_json::json!({
            "prompt": self.prompt,
            "env": env,
        });
        if let Some(base) = &self.instructions {
            data["instructions"] = serde_json::json!({ "base": base });
        }
        if let Some(model) = &self.model {
            data["session_config"] = serde_json::json!({ "model": model });
        }
        data
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got `{}`", s)),
    }
}
