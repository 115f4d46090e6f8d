use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

/// Output format for received messages on stdout.
#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum OutputFormat {
    /// One JSON object per message.
    Json,
    /// Human-readable table.
    Table,
    /// Compact single-line text.
    Pretty,
    /// Raw payload bytes, no framing or metadata.
    Raw,
}

impl OutputFormat {
    /// Table on a terminal, JSON when piped.
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    schema_id: &'a str,
    conn: u64,
    payload_size: usize,
    payload: String,
    timestamp: String,
}

/// Print one received message in the selected format.
pub fn print_message(payload: &[u8], conn: u64, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                schema_id:
                    "https://schemas.3leaps.dev/netframe/cli/v1/message-received.schema.json",
                conn,
                payload_size: payload.len(),
                payload: payload_preview(payload),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CONN", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    conn.to_string(),
                    payload.len().to_string(),
                    payload_preview(payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "conn={} size={} payload={}",
                conn,
                payload.len(),
                payload_preview(payload)
            );
        }
        OutputFormat::Raw => {
            print_raw(payload);
        }
    }
}

/// Write raw bytes to stdout without any decoration.
pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// UTF-8 payloads print as text; anything else becomes a short hex dump.
fn payload_preview(payload: &[u8]) -> String {
    const HEX_PREVIEW: usize = 16;

    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let head: String = payload
                .iter()
                .take(HEX_PREVIEW)
                .map(|b| format!("{b:02x}"))
                .collect();
            if payload.len() > HEX_PREVIEW {
                format!("0x{head}.. ({} bytes)", payload.len())
            } else {
                format!("0x{head}")
            }
        }
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
