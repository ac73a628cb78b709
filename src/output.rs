//! Rendering of API replies for the terminal. Render functions return
//! strings; the thin print wrappers write them out.

use serde_json::Value;

use crate::types::{RunReply, StatusReply};

/// Render a run reply. JSON mode dumps the whole reply; text mode prints
/// text output items, falling back to run metadata when there is no output.
pub fn render_reply(reply: &RunReply, as_json: bool, verbose: bool) -> String {
    if as_json {
        return pretty(reply);
    }

    let mut out = String::new();
    if !reply.output.is_empty() {
        for item in &reply.output {
            if item.is_text() {
                out.push_str(&item.content);
                out.push('\n');
            }
        }
    } else if let Some(info) = &reply.session_info {
        if let Some(run_id) = &info.run_id {
            out.push_str(&format!("Run ID: {run_id}\n"));
        }
        if let Some(status) = &info.status {
            out.push_str(&format!("Status: {status}\n"));
        }
    }

    if let Some(error) = reply.extra.get("error") {
        out.push_str(&format!("\nError: {}\n", compact(error)));
    }
    if let Some(debug_info) = reply.extra.get("debug") {
        if verbose {
            out.push_str(&format!("\nDebug information:\n{}\n", pretty(debug_info)));
        } else {
            out.push_str("\n[debug] details available, use --verbose to see them\n");
        }
    }
    if verbose {
        out.push_str(&format!("\nFull response:\n{}\n", pretty(reply)));
    }
    out
}

/// Render a status reply.
pub fn render_status(reply: &StatusReply, as_json: bool, verbose: bool) -> String {
    if as_json {
        return pretty(reply);
    }

    let mut out = String::new();
    if let Some(run_id) = &reply.run_id {
        out.push_str(&format!("Run ID: {run_id}\n"));
    }
    if let Some(status) = &reply.status {
        out.push_str(&format!("Status: {status}\n"));
    }
    if let Some(error) = &reply.error {
        let message = error.message.as_deref().unwrap_or("unknown error");
        out.push_str(&format!("Error: {message}\n"));
    }
    if let Some(output) = reply.run_output() {
        for item in output {
            if item.is_text() {
                out.push_str(&item.content);
                out.push('\n');
            }
        }
    }
    if verbose {
        out.push_str(&format!("\nFull response:\n{}\n", pretty(reply)));
    }
    out
}

pub fn print_reply(reply: &RunReply, as_json: bool, verbose: bool) {
    print!("{}", render_reply(reply, as_json, verbose));
}

pub fn print_status(reply: &StatusReply, as_json: bool, verbose: bool) {
    print!("{}", render_status(reply, as_json, verbose));
}

fn pretty<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "<unrenderable>".into())
}

fn compact(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
