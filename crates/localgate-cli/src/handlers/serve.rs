//! Serve command handler.
//!
//! Builds the model session against llama-server, starts the gateway and
//! runs until Ctrl+C or `quit`. While running, commands typed into the
//! terminal are handled by [`console`](super::console).

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use localgate_core::{EventSink, ModelState};
use localgate_runtime::llama::{LlamaEmbeddingModel, LlamaServerConfig, LlamaServerLoader};
use localgate_runtime::monitor::SAMPLE_INTERVAL;
use localgate_runtime::{
    FanoutSink, GatewayConfig, GatewayServer, LogStore, ModelSession, SessionConfig, TracingSink,
    spawn_monitor,
};

use super::console::{ConsoleCommand, ServeConsole, parse_command};
use crate::bootstrap::CliContext;
use crate::commands::ServeArgs;

/// Execute the serve command.
///
/// Command-line overrides apply to this run only.
pub async fn execute(ctx: &CliContext, args: ServeArgs) -> Result<()> {
    let mut settings = ctx.settings.load().await?;
    settings.merge(&args.to_update());

    let session_config = SessionConfig::from_settings(&settings)?;
    let backend = LlamaServerConfig::from_settings(&settings);

    let logs = LogStore::new();
    let sink: Arc<dyn EventSink> = Arc::new(FanoutSink::new(vec![
        Box::new(TracingSink),
        Box::new(logs.clone()),
    ]));

    let session = ModelSession::new(
        Arc::new(LlamaServerLoader::new(backend.clone())?),
        session_config,
        Arc::clone(&sink),
    )
    .with_embedding(Arc::new(LlamaEmbeddingModel::new(backend)?));

    if args.no_load {
        println!("Model loading skipped (--no-load).");
    } else {
        println!("Loading model from {}...", settings.effective_upstream_url());
        session.load().await;
        match session.wait_until_settled().await {
            ModelState::Loaded => println!("✓ Model loaded"),
            state => {
                println!("⚠️  Model not loaded ({state}).");
                println!("   Generation requests will get 503 until it is.");
            }
        }
    }

    let gateway = GatewayServer::new(Arc::new(session.clone()), Arc::clone(&sink));
    gateway.start(&GatewayConfig::from_settings(&settings)).await?;
    let monitor = spawn_monitor(Arc::clone(&sink), SAMPLE_INTERVAL);

    let interactive = std::io::stdin().is_terminal();
    if let Some(address) = gateway.address() {
        println!();
        println!("  Gateway: {address}/v1");
        println!("  Health:  {address}/health");
        println!();
        if interactive {
            println!("  Type 'help' for commands, Ctrl+C to stop");
        } else {
            println!("  Press Ctrl+C to stop");
        }
        println!();
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut reading = interactive;
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            line = lines.next_line(), if reading => match line {
                Ok(Some(line)) => match parse_command(&line) {
                    Ok(Some(ConsoleCommand::Quit)) => break,
                    Ok(Some(command)) => {
                        let console = ServeConsole {
                            session: &session,
                            gateway: &gateway,
                            logs: &logs,
                            stats: monitor.latest(),
                        };
                        println!("{}", console.apply(command));
                    }
                    Ok(None) => {}
                    Err(message) => println!("{message}"),
                },
                Ok(None) => reading = false,
                Err(e) => {
                    debug!("Console input closed: {e}");
                    reading = false;
                }
            },
        }
    }
    println!("Shutting down...");

    monitor.stop().await;
    gateway.stop().await;
    session.unload().await;
    Ok(())
}
