//! `fleetpilot chat` — Interactive or single-message chat mode.
//!
//! Replies are printed from the session's event stream as they arrive;
//! the transcript itself is only read once a turn has finished.

use fleetpilot_agent::{ConsoleSession, TurnError, TurnOutcome, TurnReport};
use fleetpilot_config::AppConfig;
use fleetpilot_core::event::DomainEvent;
use fleetpilot_core::message::Role;
use std::io::Write;
use std::time::Duration;
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, mpsc};

use super::runtime::ConsoleRuntime;

/// How long a finished turn waits for the printer to catch up.
const PRINTER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Providers that run without an API key.
const KEYLESS_PROVIDERS: &[&str] = &["ollama", "vllm", "console"];

pub async fn run(message: Option<String>, recursive: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Fail early with setup instructions when no key is configured
    if !config.has_api_key() && !KEYLESS_PROVIDERS.contains(&config.default_provider.as_str()) {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    FLEETPILOT_API_KEY = 'sk-...'   (generic)");
        eprintln!("    OPENAI_API_KEY     = 'sk-...'   (for OpenAI direct)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_path().display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let router = fleetpilot_providers::build_from_config(&config);
    let provider = router
        .default_provider()
        .ok_or("No default provider configured")?;

    let console = ConsoleRuntime::demo(&config);
    let session = console.session(&config, provider, recursive);

    let (done_tx, mut done_rx) = mpsc::channel(1);
    let printer = tokio::spawn(print_events(session.events(), done_tx));

    if let Some(msg) = message {
        // Single message mode
        run_one(&session, &msg, &mut done_rx).await?;
    } else {
        // Interactive mode
        println!();
        println!("  FleetPilot — Interactive Mode");
        println!();
        println!("  Provider:  {}", config.default_provider);
        println!("  Model:     {}", config.default_model);
        println!("  Tools:     {}", console.tools.names().join(", "));
        println!("  Mode:      {}", if recursive { "recursive" } else { "iterative" });
        println!();
        println!("  Type your message and press Enter.");
        println!("  Type '/clear' to reset the conversation, 'exit' to quit.");
        println!();
        println!("  Copilot > {}", config.agent.greeting);
        println!();

        let mut lines = BufReader::new(io::stdin()).lines();
        prompt()?;

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            match line {
                "" => {}
                "exit" | "quit" | "/exit" | "/quit" => break,
                "/clear" => match session.clear() {
                    Ok(()) => println!("  (conversation cleared)\n"),
                    Err(e) => eprintln!("  [Error] {e}"),
                },
                _ => run_one(&session, line, &mut done_rx).await?,
            }
            prompt()?;
        }

        println!();
        println!("  Goodbye!");
        println!();
    }

    printer.abort();
    Ok(())
}

fn prompt() -> std::io::Result<()> {
    print!("  You > ");
    std::io::stdout().flush()
}

async fn run_one(
    session: &ConsoleSession,
    input: &str,
    done: &mut mpsc::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error>> {
    print!("\n  Copilot > ");
    std::io::stdout().flush()?;

    // Drop completion signals left over from a lagged earlier turn.
    while done.try_recv().is_ok() {}

    let report = match session.ask(input).await {
        Ok(report) => report,
        Err(TurnError::Busy) => {
            eprintln!("  [Busy] a turn is already running");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    if report.outcome != TurnOutcome::Ignored {
        wait_for_printer(done).await;
    }
    println!();

    print_unstreamed(session, &report).await;
    println!();
    Ok(())
}

/// Wait until every streamed fragment of the finished turn has been printed,
/// or give up after [`PRINTER_DRAIN_TIMEOUT`].
async fn wait_for_printer(done: &mut mpsc::Receiver<()>) {
    if tokio::time::timeout(PRINTER_DRAIN_TIMEOUT, done.recv()).await.is_err() {
        tracing::debug!("Printer did not report turn completion");
    }
}

/// Print the assistant message a turn appended without streaming it
/// (the apology or the loop-ceiling notice).
async fn print_unstreamed(session: &ConsoleSession, report: &TurnReport) {
    let messages = session.messages().await;
    if let Some(last) = messages.last()
        && last.role == Role::Assistant
        && Some(last.id) != report.reply_id
        && report.outcome != TurnOutcome::Ignored
    {
        println!("  Copilot > {}", last.content);
    }
    if let Some(error) = &report.error {
        eprintln!("  [Error] {error}");
    }
}

async fn print_events(
    mut events: broadcast::Receiver<std::sync::Arc<DomainEvent>>,
    done: mpsc::Sender<()>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Chat printer fell behind");
                // The dropped events may include the turn's completion.
                let _ = done.try_send(());
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        match event.as_ref() {
            DomainEvent::FragmentAppended { fragment, .. } => {
                print!("{fragment}");
                let _ = std::io::stdout().flush();
            }
            DomainEvent::ReplyReset { .. } => {
                print!("\n  Copilot > ");
                let _ = std::io::stdout().flush();
            }
            DomainEvent::ToolExecuted {
                tool_name,
                success,
                duration_ms,
                ..
            } => {
                let status = if *success { "ok" } else { "failed" };
                eprintln!("\n  [tool] {tool_name} {status} ({duration_ms}ms)");
            }
            DomainEvent::TurnCompleted { .. } => {
                let _ = done.send(()).await;
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use fleetpilot_core::message::MessageId;
    use std::sync::Arc;

    fn fragment(text: &str) -> Arc<DomainEvent> {
        Arc::new(DomainEvent::FragmentAppended {
            message_id: MessageId::new(),
            fragment: text.into(),
        })
    }

    #[tokio::test]
    async fn printer_signals_completion() {
        let (events_tx, events_rx) = broadcast::channel(8);
        let (done_tx, mut done_rx) = mpsc::channel(1);
        let printer = tokio::spawn(print_events(events_rx, done_tx));

        events_tx.send(fragment("hi")).unwrap();
        events_tx
            .send(Arc::new(DomainEvent::TurnCompleted {
                iterations: 0,
                outcome: "answered".into(),
                timestamp: Utc::now(),
            }))
            .unwrap();

        assert!(tokio::time::timeout(Duration::from_secs(5), done_rx.recv()).await.unwrap().is_some());
        printer.abort();
    }

    #[tokio::test]
    async fn lagged_printer_still_signals_completion() {
        let (events_tx, events_rx) = broadcast::channel(1);
        let (done_tx, mut done_rx) = mpsc::channel(1);

        // Overflow the channel before the printer reads; the completion is lost.
        for text in ["a", "b", "c"] {
            events_tx.send(fragment(text)).unwrap();
        }
        let printer = tokio::spawn(print_events(events_rx, done_tx));

        assert!(tokio::time::timeout(Duration::from_secs(5), done_rx.recv()).await.unwrap().is_some());
        printer.abort();
    }

    #[tokio::test]
    async fn waiting_for_a_silent_printer_times_out() {
        tokio::time::pause();
        let (_done_tx, mut done_rx) = mpsc::channel::<()>(1);

        let started = tokio::time::Instant::now();
        wait_for_printer(&mut done_rx).await;

        assert!(started.elapsed() >= PRINTER_DRAIN_TIMEOUT);
    }
}
