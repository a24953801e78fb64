use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tradedash_core::api::{BrainApi, HttpBrainClient};
use tradedash_core::chart::RenderOutcome;
use tradedash_core::chat::{ChatUpdate, TurnOutcome};
use tradedash_core::shell::{Dashboard, Timeframe};

mod repl;
mod surface;

use surface::TerminalSurface;

#[derive(Debug, Parser)]
#[command(name = "tradedash")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check that the backend is up.
    Health,

    /// Fetch one chart and print it.
    Chart {
        #[arg(long, default_value = "AAPL")]
        symbol: String,

        #[arg(long, default_value = "1d")]
        timeframe: Timeframe,

        /// Indicator label passed verbatim, e.g. "SMA(20)". Repeatable.
        #[arg(long = "indicator")]
        indicators: Vec<String>,
    },

    /// Ask the assistant one question and stream the answer.
    Chat { message: String },

    /// Interactive dashboard: chart commands and chat in one prompt.
    Repl,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = tradedash_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let result = run(args.command, &settings).await;
    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
    }
    result
}

async fn run(command: Command, settings: &tradedash_core::config::Settings) -> anyhow::Result<()> {
    let client = HttpBrainClient::from_settings(settings)?;
    tracing::debug!(base_url = client.base_url(), "backend configured");
    let api: Arc<dyn BrainApi> = Arc::new(client);

    match command {
        Command::Health => {
            let health = api.check_health().await.context("health check failed")?;
            println!("{}", health.status);
        }
        Command::Chart {
            symbol,
            timeframe,
            indicators,
        } => {
            let mut dashboard = Dashboard::new(api, TerminalSurface::new());
            let shell = dashboard.shell_mut();
            shell.submit_symbol(&symbol);
            shell.set_timeframe(timeframe);
            for label in &indicators {
                if !shell.is_active(label) {
                    shell.toggle_indicator(label);
                }
            }
            let title = format!("{} {}", dashboard.shell().symbol(), dashboard.shell().timeframe());
            dashboard.surface_mut().set_title(title);

            let outcome = dashboard.force_refresh().await;
            dashboard.close();
            anyhow::ensure!(
                outcome == RenderOutcome::Applied,
                "chart fetch did not complete ({outcome:?}); see log for details"
            );
        }
        Command::Chat { message } => {
            let mut dashboard = Dashboard::new(api, TerminalSurface::new());
            let (cancel_tx, cancel_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    let _ = cancel_tx.send(true);
                }
            });

            let outcome = dashboard
                .send_chat(&message, cancel_rx, print_update)
                .await?;
            println!();
            if outcome == TurnOutcome::ConnectionFailed {
                anyhow::bail!("chat stream failed; see log for details");
            }
        }
        Command::Repl => {
            let mut dashboard = Dashboard::new(api, TerminalSurface::new());
            repl::run(&mut dashboard).await?;
            dashboard.close();
        }
    }

    Ok(())
}

/// Echo streamed text as it arrives.
pub(crate) fn print_update(update: ChatUpdate<'_>) {
    if let Err(err) = write_update(&mut std::io::stdout().lock(), update) {
        tracing::debug!(error = %err, "failed to write chat output");
    }
}

fn write_update(out: &mut impl Write, update: ChatUpdate<'_>) -> std::io::Result<()> {
    match update {
        ChatUpdate::Chunk(text) => write!(out, "{text}")?,
        ChatUpdate::Error(error) => write!(out, "\nError: {error}\n")?,
        ChatUpdate::ConnectionFailed => {
            write!(out, "\n{}\n", tradedash_core::chat::CONNECT_ERROR_MESSAGE)?
        }
    }
    out.flush()
}

fn init_sentry(settings: &tradedash_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn updates_are_written_as_chat_text() {
        let mut out = Vec::new();
        write_update(&mut out, ChatUpdate::Chunk("Hel")).unwrap();
        write_update(&mut out, ChatUpdate::Chunk("lo")).unwrap();
        write_update(&mut out, ChatUpdate::Error("upstream down")).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Hello\nError: upstream down\n");
    }

    #[test]
    fn write_failures_are_reported() {
        let err = write_update(&mut ClosedPipe, ChatUpdate::Chunk("x")).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    }
}
