//! Interactive chat REPL against a configured agentic app.
//!
//! One session reference spans the whole conversation so the platform keeps
//! context between turns. `#`-prefixed commands adjust the session without
//! sending a query; `exit`, `quit`, or `q` (or EOF) leave.

use std::io::{self, BufRead, Write};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::{AgenticClient, ExecuteOptions};
use crate::error::ApiError;
use crate::types::RunReply;

/// Fresh `chat-{uuid4}` session reference.
pub fn generate_session_id() -> String {
    format!("chat-{}", Uuid::new_v4())
}

/// Mutable chat state: the session reference plus the per-query options the
/// `#debug` / `#stream` commands toggle.
pub struct ChatSession {
    pub session_id: String,
    pub opts: ExecuteOptions,
    pub verbose: bool,
}

pub async fn run(client: &AgenticClient, mut session: ChatSession) -> Result<(), ApiError> {
    print_banner(&session.session_id, &client.config().env_name);
    info!(session_id = %session.session_id, "starting chat session");

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("\nYou: ");
        io::stdout().flush().ok();

        let Some(Ok(line)) = lines.next() else {
            println!("\nGoodbye! Session ended.");
            info!("chat session ended at EOF");
            return Ok(());
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.starts_with('#') {
            handle_command(input, &mut session, client);
            continue;
        }
        if matches!(input, "exit" | "quit" | "q") {
            println!("\nGoodbye! Session ended.");
            info!("chat session ended by user");
            return Ok(());
        }

        debug!(session_id = %session.session_id, "sending chat query");
        match client
            .execute_run(input, &session.session_id, &session.opts)
            .await
        {
            Ok(reply) => print_response(&reply, session.verbose),
            // Keep the loop alive so the user can retry.
            Err(e) => {
                warn!(error = %e, "chat query failed");
                eprintln!("\nError: {e}");
            }
        }
    }
}

fn handle_command(input: &str, session: &mut ChatSession, client: &AgenticClient) {
    let mut parts = input.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or("").to_ascii_lowercase();
    let arg = parts.next().map(str::trim).unwrap_or("");

    match command.as_str() {
        "#help" => print_help(),
        "#new" | "#newsession" => {
            let new_id = generate_session_id();
            println!();
            println!("╔═══════════════════════════════════════╗");
            println!("║         New Session Started           ║");
            println!("╚═══════════════════════════════════════╝");
            println!("Previous Session: {}", session.session_id);
            println!("New Session: {new_id}");
            info!(old = %session.session_id, new = %new_id, "started new chat session");
            session.session_id = new_id;
        }
        "#info" | "#session" => print_info(session, client),
        "#clear" => {
            print!("\x1b[2J\x1b[1;1H");
            print_banner(&session.session_id, &client.config().env_name);
        }
        "#debug" => match arg {
            "" => {
                let state = if session.opts.debug { "enabled" } else { "disabled" };
                println!("Debug mode is currently {state}");
            }
            "on" => {
                session.opts.debug = true;
                session.opts.debug_mode = None;
                println!("Debug mode enabled");
            }
            "off" => {
                session.opts.debug = false;
                session.opts.debug_mode = None;
                println!("Debug mode disabled");
            }
            other => println!("Invalid argument: '{other}'. Use '#debug on' or '#debug off'"),
        },
        "#stream" => match arg {
            "" => match session.opts.stream_mode {
                Some(mode) => println!("Streaming is enabled: {}", mode.as_str()),
                None => println!("Streaming is disabled"),
            },
            "off" => {
                session.opts.stream_mode = None;
                println!("Streaming disabled");
            }
            "on" => {
                session.opts.stream_mode = Some(crate::api::StreamMode::Tokens);
                println!("Streaming enabled (mode: tokens)");
            }
            "tokens" => set_stream(session, crate::api::StreamMode::Tokens),
            "messages" => set_stream(session, crate::api::StreamMode::Messages),
            "custom" => set_stream(session, crate::api::StreamMode::Custom),
            other => {
                println!("Invalid argument: '{other}'");
                println!("Use: #stream on|off|tokens|messages|custom");
            }
        },
        "#history" => println!("History is not recorded yet."),
        other => {
            warn!(command = other, "unknown chat command");
            println!("Unknown command: {other}. Type #help for available commands.");
        }
    }
}

fn set_stream(session: &mut ChatSession, mode: crate::api::StreamMode) {
    session.opts.stream_mode = Some(mode);
    println!("Streaming enabled (mode: {})", mode.as_str());
}

fn print_banner(session_id: &str, env_name: &str) {
    println!("╔═══════════════════════════════════════╗");
    println!("║   Agentic API Chat Session Started    ║");
    println!("╚═══════════════════════════════════════╝");
    println!("Session ID: {session_id}");
    println!("Environment: {env_name}");
    println!();
    println!("Type your message or 'exit' to quit. Type '#help' for commands.");
}

fn print_help() {
    println!();
    println!("Available commands:");
    println!("  #help              - Show this help message");
    println!("  #new               - Start a new session");
    println!("  #info              - Show current session information");
    println!("  #clear             - Clear the terminal screen");
    println!("  #debug on|off      - Toggle debug mode");
    println!("  #stream on|off|tokens|messages|custom - Toggle streaming");
    println!();
    println!("To exit chat, type: exit, quit, or q");
}

fn print_info(session: &ChatSession, client: &AgenticClient) {
    let config = client.config();
    println!();
    println!("Session information:");
    println!("  Session ID: {}", session.session_id);
    println!("  Environment: {}", config.env_name);
    println!("  App ID: {}", config.app_id.as_deref().unwrap_or("Not set"));
    if let Some(user_id) = &session.opts.user_reference {
        println!("  User ID: {user_id}");
    }
    match (session.opts.debug, session.opts.debug_mode) {
        (true, Some(mode)) => println!("  Debug: enabled ({})", mode.as_str()),
        (true, None) => println!("  Debug: enabled"),
        (false, _) => println!("  Debug: disabled"),
    }
    match session.opts.stream_mode {
        Some(mode) => println!("  Streaming: {}", mode.as_str()),
        None => println!("  Streaming: disabled"),
    }
}

fn print_response(reply: &RunReply, verbose: bool) {
    print!("\nAgent: ");
    let mut printed = false;
    for item in &reply.output {
        if item.is_text() {
            println!("{}", item.content);
            printed = true;
        }
    }
    if !printed {
        println!("(no content)");
    }
    if verbose {
        if let Some(debug_info) = reply.extra.get("debug") {
            let rendered = serde_json::to_string_pretty(debug_info).unwrap_or_default();
            println!("\n[debug] {rendered}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_prefixed_and_unique() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert!(a.starts_with("chat-"));
        assert_ne!(a, b);
        // chat- plus a uuid4
        assert_eq!(a.len(), 5 + 36);
    }
}
