use crate::surface::TerminalSurface;
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::watch;
use tradedash_core::api::ChatRole;
use tradedash_core::chat::{SubmitError, TurnOutcome};
use tradedash_core::shell::{Dashboard, Timeframe, AVAILABLE_INDICATORS};

const HELP: &str = "\
commands:
  /symbol TICKER    switch symbol
  /tf TIMEFRAME     switch timeframe (1m 5m 15m 1h 4h 1d 1w 1mo)
  /ind LABEL        toggle an indicator, e.g. /ind SMA(20)
  /show             refetch and print the chart
  /history          print the chat history
  /quit             leave (Ctrl-D works too)
anything else is sent to the assistant; Ctrl-C stops a running answer,
and leaves when nothing is running.";

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Symbol(&'a str),
    Timeframe(&'a str),
    Indicator(&'a str),
    Show,
    History,
    Help,
    Quit,
    Chat(&'a str),
    Unknown(&'a str),
}

fn parse(line: &str) -> Input<'_> {
    let line = line.trim();
    let Some(command) = line.strip_prefix('/') else {
        return Input::Chat(line);
    };
    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };
    match name {
        "symbol" | "s" => Input::Symbol(arg),
        "tf" | "timeframe" => Input::Timeframe(arg),
        "ind" | "indicator" => Input::Indicator(arg),
        "show" => Input::Show,
        "history" => Input::History,
        "help" | "?" => Input::Help,
        "quit" | "exit" | "q" => Input::Quit,
        _ => Input::Unknown(name),
    }
}

fn title(dashboard: &Dashboard<TerminalSurface>) -> String {
    let shell = dashboard.shell();
    format!("{} {}", shell.symbol(), shell.timeframe())
}

async fn refresh(dashboard: &mut Dashboard<TerminalSurface>) {
    let title = title(dashboard);
    dashboard.surface_mut().set_title(title);
    dashboard.refresh_chart().await;
}

/// Next input line, or `None` at end of input or when `interrupt` fires first.
async fn next_input<R, F>(lines: &mut Lines<R>, interrupt: F) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    F: Future,
{
    tokio::select! {
        biased;
        _ = interrupt => {
            println!();
            Ok(None)
        }
        line = lines.next_line() => line,
    }
}

pub async fn run(dashboard: &mut Dashboard<TerminalSurface>) -> anyhow::Result<()> {
    println!("{}", dashboard.chat().last_message().map(|m| m.content.as_str()).unwrap_or_default());
    println!("available indicators: {}", AVAILABLE_INDICATORS.join(", "));
    println!("type /help for commands");
    refresh(dashboard).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        // Ctrl-C at the prompt leaves; during an answer it only stops the answer.
        let Some(line) = next_input(&mut lines, tokio::signal::ctrl_c()).await? else {
            break;
        };

        match parse(&line) {
            Input::Chat("") => continue,
            Input::Symbol(arg) => {
                if !dashboard.shell_mut().submit_symbol(arg) {
                    println!("symbol unchanged ({})", dashboard.shell().symbol());
                }
            }
            Input::Timeframe(arg) => match arg.parse::<Timeframe>() {
                Ok(tf) => {
                    dashboard.shell_mut().set_timeframe(tf);
                }
                Err(err) => println!("{err}"),
            },
            Input::Indicator("") => {
                println!("active: {}", dashboard.shell().indicators().join(", "));
            }
            Input::Indicator(label) => {
                let active = dashboard.shell_mut().toggle_indicator(label);
                println!("{label} {}", if active { "on" } else { "off" });
            }
            Input::Show => {
                let title = title(dashboard);
                dashboard.surface_mut().set_title(title);
                dashboard.force_refresh().await;
            }
            Input::History => {
                for msg in dashboard.chat().history() {
                    let who = match msg.role {
                        ChatRole::User => "you",
                        ChatRole::Ai => "ai",
                    };
                    println!("{who}: {}", msg.content);
                }
            }
            Input::Help => println!("{HELP}"),
            Input::Quit => break,
            Input::Unknown(name) => println!("unknown command /{name}; try /help"),
            Input::Chat(text) => {
                let (cancel_tx, cancel_rx) = watch::channel(false);
                let on_ctrl_c = tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        let _ = cancel_tx.send(true);
                    }
                });
                let outcome = dashboard
                    .send_chat(text, cancel_rx, crate::print_update)
                    .await;
                on_ctrl_c.abort();
                match outcome {
                    Ok(TurnOutcome::Cancelled) => println!("\n(stopped)"),
                    Ok(_) => println!(),
                    Err(SubmitError::Busy) => println!("still answering"),
                    Err(SubmitError::Empty) => {}
                }
            }
        }
        refresh(dashboard).await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_chat() {
        assert_eq!(parse("/symbol msft"), Input::Symbol("msft"));
        assert_eq!(parse("  /ind SMA(20) "), Input::Indicator("SMA(20)"));
        assert_eq!(parse("/tf 1h"), Input::Timeframe("1h"));
        assert_eq!(parse("/show"), Input::Show);
        assert_eq!(parse("/quit"), Input::Quit);
        assert_eq!(parse("/nope"), Input::Unknown("nope"));
        assert_eq!(parse("Add EMA(50)"), Input::Chat("Add EMA(50)"));
        assert_eq!(parse("   "), Input::Chat(""));
    }

    #[tokio::test]
    async fn interrupt_at_prompt_ends_input() {
        let mut lines = BufReader::new(&b"/show\n"[..]).lines();
        let line = next_input(&mut lines, std::future::ready(())).await.unwrap();
        assert_eq!(line, None);
    }

    #[tokio::test]
    async fn lines_arrive_while_no_interrupt() {
        let mut lines = BufReader::new(&b"/show\nhello\n"[..]).lines();
        let pending = std::future::pending::<()>;
        assert_eq!(
            next_input(&mut lines, pending()).await.unwrap().as_deref(),
            Some("/show")
        );
        assert_eq!(
            next_input(&mut lines, pending()).await.unwrap().as_deref(),
            Some("hello")
        );
        assert_eq!(next_input(&mut lines, pending()).await.unwrap(), None);
    }

    #[test]
    fn indicator_labels_keep_inner_spaces() {
        assert_eq!(parse("/ind MACD(12, 26, 9)"), Input::Indicator("MACD(12, 26, 9)"));
    }
}
