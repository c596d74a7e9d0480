use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use usartkit_line::{baud, BaudEntry, PortId};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One block of received data.
pub struct Received<'a> {
    pub port: PortId,
    pub data: &'a [u8],
    /// Terminator ending `data` when it is a complete message.
    pub terminator: Option<u8>,
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    kind: &'a str,
    port: String,
    size: usize,
    payload: String,
    timestamp: String,
}

pub fn print_received(received: &Received<'_>, format: OutputFormat) {
    let kind = if received.terminator.is_some() {
        "message"
    } else {
        "block"
    };
    let payload = payload_preview(body(received));

    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                kind,
                port: received.port.to_string(),
                size: received.data.len(),
                payload,
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
                .set_header(vec!["PORT", "KIND", "SIZE", "PAYLOAD"])
                .add_row(vec![
                    received.port.to_string(),
                    kind.to_string(),
                    received.data.len().to_string(),
                    payload,
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "port={} kind={} size={} payload={}",
                received.port,
                kind,
                received.data.len(),
                payload
            );
        }
        OutputFormat::Raw => print_raw(received.data),
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

#[derive(Debug, Serialize)]
pub struct DivisorRow {
    pub clock_hz: u32,
    pub baud: u32,
    pub double_speed: bool,
    pub ubrr: u16,
    pub actual_baud: f64,
    pub error_percent: f64,
}

impl DivisorRow {
    pub fn new(clock_hz: u32, baud: u32, double_speed: bool, ubrr: u16) -> Self {
        Self {
            clock_hz,
            baud,
            double_speed,
            ubrr,
            actual_baud: baud::actual_baud(clock_hz, ubrr, double_speed),
            error_percent: baud::error_percent(clock_hz, baud, ubrr, double_speed),
        }
    }

    /// Both speed modes of a table entry.
    pub fn from_entry(entry: &BaudEntry) -> [Self; 2] {
        [true, false]
            .map(|double| Self::new(entry.clock_hz, entry.baud, double, entry.ubrr(double)))
    }
}

pub fn print_divisors(rows: &[DivisorRow], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = if rows.len() == 1 {
                serde_json::to_string(&rows[0])
            } else {
                serde_json::to_string(rows)
            };
            println!("{}", out.unwrap_or_else(|_| "{}".to_string()));
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CLOCK", "BAUD", "U2X", "UBRR", "ACTUAL", "ERROR"]);
            for row in rows {
                table.add_row(vec![
                    format_clock(row.clock_hz),
                    row.baud.to_string(),
                    u8::from(row.double_speed).to_string(),
                    row.ubrr.to_string(),
                    format!("{:.0}", row.actual_baud),
                    format!("{:+.2}%", row.error_percent),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in rows {
                println!(
                    "clock={} baud={} u2x={} ubrr={} error={:+.2}%",
                    format_clock(row.clock_hz),
                    row.baud,
                    u8::from(row.double_speed),
                    row.ubrr,
                    row.error_percent
                );
            }
        }
        OutputFormat::Raw => {
            for row in rows {
                println!(
                    "{}\t{}\t{}\t{}",
                    row.clock_hz,
                    row.baud,
                    u8::from(row.double_speed),
                    row.ubrr
                );
            }
        }
    }
}

fn body<'a>(received: &Received<'a>) -> &'a [u8] {
    match (received.terminator, received.data.split_last()) {
        (Some(terminator), Some((&last, rest))) if last == terminator => rest,
        _ => received.data,
    }
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

fn format_clock(clock_hz: u32) -> String {
    if clock_hz % 1_000_000 == 0 {
        format!("{} MHz", clock_hz / 1_000_000)
    } else {
        format!("{clock_hz} Hz")
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
