//! Interactive review client.
//!
//! Reads code from stdin one line at a time and prints the conversation as
//! the endpoint streams its answers.
//!
//! Commands:
//! - `/lang <name>` switches the submission language
//! - `/quit` shuts the session down
//!
//! Usage:
//!   cargo run --example chat -- ws://127.0.0.1:9000
//!   cargo run --example chat -- ws://127.0.0.1:9000 --debug
//!   RUST_LOG=code_doctor=trace cargo run --example chat

// ============================================================================
// Imports
// ============================================================================

use code_doctor::{Result, Sender, Session, SessionSnapshot, SubmitOutcome};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_URL: &str = "ws://127.0.0.1:9000";
const DEFAULT_LANGUAGE: &str = "Python";

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let debug = args.iter().any(|a| a == "--debug");
    let url = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .cloned()
        .unwrap_or_else(|| DEFAULT_URL.to_owned());

    init_logging(debug);

    if let Err(e) = run(url).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(url: String) -> Result<()> {
    println!("=== Code Doctor ===");
    println!("Endpoint: {url}\n");

    let session = Session::connect(url).await?;

    // Print every message once it is finalized.
    let mut updates = session.subscribe();
    let printer = tokio::spawn(async move {
        let mut printed = 0;
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            printed = print_new(&snapshot, printed);
        }
    });

    let mut language = DEFAULT_LANGUAGE.to_owned();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();

        if line == "/quit" {
            break;
        }

        if let Some(name) = line.strip_prefix("/lang ") {
            language = name.trim().to_owned();
            println!("[language: {language}]");
            continue;
        }

        // A disconnect shows up as a notice in the log.
        if session.submit(line, language.as_str()).await? == SubmitOutcome::Busy {
            println!("[still answering, try again shortly]");
        }
    }

    session.shutdown().await;
    printer.abort();
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

/// Prints finalized messages after index `printed`, returning the new index.
fn print_new(snapshot: &SessionSnapshot, printed: usize) -> usize {
    let mut next = printed;

    for message in snapshot.messages.iter().skip(printed) {
        if message.is_streaming() {
            break;
        }
        let who = match message.sender {
            Sender::User => "you",
            Sender::Ai => "doctor",
        };
        println!("[{who}] {}", message.text);
        next += 1;
    }

    next
}

fn init_logging(debug: bool) {
    let filter = if debug {
        "code_doctor=debug"
    } else {
        "code_doctor=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}
