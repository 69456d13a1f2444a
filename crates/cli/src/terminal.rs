//! Terminal I/O: stdin lines in, coloured display events out.

use std::io::{BufRead, Write};

use tiller_core::event::DisplayEvent;
use tokio::sync::mpsc;

const BLUE: &str = "\u{1b}[94m";
const YELLOW: &str = "\u{1b}[93m";
const GREEN: &str = "\u{1b}[92m";
const RED: &str = "\u{1b}[91m";
const RESET: &str = "\u{1b}[0m";

/// Forward stdin lines to `tx` until EOF or until the engine stops listening.
///
/// Runs on a plain thread: a blocking stdin read cannot be interrupted, and a
/// detached thread does not hold up process exit.
pub fn spawn_stdin_reader(tx: mpsc::Sender<String>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
}

/// How an event looks on screen.
pub fn format_event(event: &DisplayEvent) -> String {
    match event {
        DisplayEvent::General(text) => format!("{text}\n"),
        DisplayEvent::Assistant(text) => format!("{YELLOW}Tiller{RESET}: {text}\n"),
        DisplayEvent::Tool(call) => format!("{GREEN}tool{RESET}: {call}\n"),
        DisplayEvent::Error(text) => format!("{RED}error{RESET}: {text}\n"),
        DisplayEvent::Prompt => format!("{BLUE}You{RESET}: "),
        DisplayEvent::Exit => "Bye!\n".to_string(),
    }
}

/// Print events until every sender is gone. Returns how many errors were shown.
pub async fn render(mut rx: mpsc::UnboundedReceiver<DisplayEvent>) -> usize {
    let mut errors = 0;
    while let Some(event) = rx.recv().await {
        if matches!(event, DisplayEvent::Error(_)) {
            errors += 1;
        }
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(format_event(&event).as_bytes());
        let _ = stdout.flush();
    }
    errors
}
