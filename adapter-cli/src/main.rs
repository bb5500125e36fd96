mod cli;

use adapter_core::{ClientError, Payload};
use adapter_http::{start_server, HttpTransport};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cli::{CallArgs, Cli, Command, ServeArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Call(args) => call(args).await,
    }
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    info!("codex-adapter v{}", env!("CARGO_PKG_VERSION"));

    let config = args.server_config();
    let handler = args.build_handler();

    start_server(config, handler, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Shutting down...");
    })
    .await?;
    Ok(())
}

async fn call(args: CallArgs) -> anyhow::Result<()> {
    info!("Connecting to {}", args.url);
    let handle = HttpTransport::new(args.url.clone()).into_handle();

    let session_id = handle.ensure_session().await?;
    info!("[] - [{}] Session ready", session_id);

    let outcome = handle.call(Payload::new(args.payload_data())).await;
    if let Err(e) = handle.close().await {
        error!("Failed to end session: {}", e);
    }

    match outcome {
        Ok(payload) => {
            println!("{}", serde_json::to_string_pretty(&payload.data)?);
            Ok(())
        }
        Err(ClientError::Remote(e)) => {
            anyhow::bail!("adapter returned {} (retryable: {}): {}", e.kind, e.retryable, e.message)
        }
        Err(e) => Err(e.into()),
    }
}
