use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use impactrelay_acquire::{PeakRecord, SessionSummary};
use impactrelay_relay::{loudness, RelayMessage};
use impactrelay_transport::PortDescription;
use serde::Serialize;

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

#[derive(Serialize)]
struct EventOutput {
    #[serde(rename = "type")]
    kind: &'static str,
    time: String,
    seq: u32,
    event: usize,
    events_in_packet: usize,
    start: usize,
    end: usize,
    peak: u64,
    loudness: f64,
    duration: usize,
}

impl From<&PeakRecord> for EventOutput {
    fn from(record: &PeakRecord) -> Self {
        Self {
            kind: "event",
            time: record.time_label(),
            seq: record.seq,
            event: record.event_index,
            events_in_packet: record.event_total,
            start: record.start,
            end: record.end,
            peak: record.peak,
            loudness: record.loudness(),
            duration: record.duration,
        }
    }
}

#[derive(Serialize)]
struct SummaryOutput {
    #[serde(rename = "type")]
    kind: &'static str,
    total_packets: usize,
    threshold: i64,
    total_events: usize,
    max_peak: Option<u64>,
    min_peak: Option<u64>,
    avg_peak: Option<f64>,
    avg_duration: Option<f64>,
    undersized_packets: u64,
    garbage_bytes: u64,
    evicted_bytes: u64,
}

impl From<&SessionSummary> for SummaryOutput {
    fn from(summary: &SessionSummary) -> Self {
        let events = summary.events.as_ref();
        Self {
            kind: "summary",
            total_packets: summary.total_packets,
            threshold: summary.threshold,
            total_events: events.map_or(0, |e| e.total),
            max_peak: events.map(|e| e.max_peak),
            min_peak: events.map(|e| e.min_peak),
            avg_peak: events.map(|e| e.avg_peak),
            avg_duration: events.map(|e| e.avg_duration),
            undersized_packets: summary.framer.undersized,
            garbage_bytes: summary.framer.garbage_bytes,
            evicted_bytes: summary.framer.evicted_bytes,
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum MessageOutput<'a> {
    Event {
        seq: u32,
        offset: u32,
        compression: u16,
        samples: usize,
        peak: u64,
        loudness: f64,
    },
    Status {
        time: &'a str,
        seq: u32,
        event: usize,
        events_in_packet: usize,
        loudness: f64,
    },
    Threshold {
        threshold: i64,
    },
    Text {
        line: &'a str,
    },
}

impl<'a> From<&'a RelayMessage> for MessageOutput<'a> {
    fn from(message: &'a RelayMessage) -> Self {
        match message {
            RelayMessage::Event(frame) => {
                let peak = frame
                    .samples
                    .iter()
                    .map(|s| u64::from(s.unsigned_abs()))
                    .max()
                    .unwrap_or(0);
                Self::Event {
                    seq: frame.seq,
                    offset: frame.offset,
                    compression: frame.compression,
                    samples: frame.samples.len(),
                    peak,
                    loudness: loudness(peak),
                }
            }
            RelayMessage::Status(line) => Self::Status {
                time: &line.timestamp,
                seq: line.seq,
                event: line.event_index,
                events_in_packet: line.event_total,
                loudness: line.loudness,
            },
            RelayMessage::Threshold(threshold) => Self::Threshold {
                threshold: *threshold,
            },
            RelayMessage::Text(line) => Self::Text { line },
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn event_row(i: usize, record: &PeakRecord) -> Vec<String> {
    vec![
        i.to_string(),
        record.time_label(),
        record.seq.to_string(),
        format!("{}/{}", record.event_index, record.event_total),
        record.peak.to_string(),
        format!("{:.4}", record.loudness()),
        record.duration.to_string(),
    ]
}

const EVENT_HEADER: [&str; 7] = ["#", "TIME", "PACK", "EVENT", "PEAK", "LOUD", "DURATION"];

/// Print one accepted event as it happens.
pub fn print_event(record: &PeakRecord, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&EventOutput::from(record)),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!(
                "{} | Pack#{} | Event {}/{} | Max={} | Duration={}",
                record.time_label(),
                record.seq,
                record.event_index,
                record.event_total,
                record.peak,
                record.duration
            );
        }
        OutputFormat::Raw => {
            println!("{},{},{},{}", record.seq, record.start, record.end, record.peak);
        }
    }
}

/// Print the end-of-session report: totals, then the most recent events.
pub fn print_session(summary: &SessionSummary, recent: &[PeakRecord], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&SummaryOutput::from(summary)),
        OutputFormat::Table => {
            let out = SummaryOutput::from(summary);
            let mut totals = table();
            totals.set_header(vec!["PACKETS", "THRESHOLD", "EVENTS", "MAX", "MIN", "AVG", "AVG DURATION"]);
            totals.add_row(vec![
                out.total_packets.to_string(),
                out.threshold.to_string(),
                out.total_events.to_string(),
                display_opt(out.max_peak),
                display_opt(out.min_peak),
                display_opt(out.avg_peak.map(|v| format!("{v:.0}"))),
                display_opt(out.avg_duration.map(|v| format!("{v:.0}"))),
            ]);
            println!("{totals}");

            if !recent.is_empty() {
                let mut events = table();
                events.set_header(EVENT_HEADER.to_vec());
                for (i, record) in recent.iter().enumerate() {
                    events.add_row(event_row(i + 1, record));
                }
                println!("{events}");
            }
        }
        OutputFormat::Pretty => {
            println!("Total packets processed: {}", summary.total_packets);
            println!("Threshold:               {}", summary.threshold);
            match &summary.events {
                Some(events) => {
                    println!("  Total events:  {}", events.total);
                    println!("  Max peak:      {}", events.max_peak);
                    println!("  Min peak:      {}", events.min_peak);
                    println!("  Avg peak:      {:.0}", events.avg_peak);
                    println!("  Avg duration:  {:.0} samples", events.avg_duration);
                }
                None => println!("  No events were detected during the session."),
            }
            for (i, record) in recent.iter().enumerate() {
                println!(
                    "{}. {} | Pack#{} | Event {}/{} | Max={} | Duration={}",
                    i + 1,
                    record.time_label(),
                    record.seq,
                    record.event_index,
                    record.event_total,
                    record.peak,
                    record.duration
                );
            }
        }
        OutputFormat::Raw => {
            println!(
                "{} {} {}",
                summary.total_packets,
                summary.events.as_ref().map_or(0, |e| e.total),
                summary.threshold
            );
        }
    }
}

/// Print one message decoded from the relay link.
pub fn print_message(message: &RelayMessage, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&MessageOutput::from(message)),
        OutputFormat::Table | OutputFormat::Pretty => match message {
            RelayMessage::Event(frame) => println!(
                "[event] Pack#{} offset={} samples={} (x{})",
                frame.seq,
                frame.offset,
                frame.samples.len(),
                frame.compression
            ),
            RelayMessage::Status(line) => println!("[status] {line}"),
            RelayMessage::Threshold(threshold) => println!("[threshold] {threshold}"),
            RelayMessage::Text(line) => println!("[text] {line}"),
        },
        OutputFormat::Raw => match message {
            RelayMessage::Event(frame) => {
                let samples: Vec<String> = frame.expand().iter().map(i32::to_string).collect();
                println!("{}", samples.join(" "));
            }
            RelayMessage::Status(line) => println!("{line}"),
            RelayMessage::Threshold(threshold) => println!("THRESHOLD={threshold}"),
            RelayMessage::Text(line) => println!("{line}"),
        },
    }
}

#[derive(Serialize)]
struct PortOutput<'a> {
    name: &'a str,
    kind: &'a str,
    product: Option<&'a str>,
}

pub fn print_ports(ports: &[PortDescription], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out: Vec<PortOutput<'_>> = ports
                .iter()
                .map(|port| PortOutput {
                    name: &port.name,
                    kind: port.kind,
                    product: port.product.as_deref(),
                })
                .collect();
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut out = table();
            out.set_header(vec!["PORT", "KIND", "PRODUCT"]);
            for port in ports {
                out.add_row(vec![
                    port.name.clone(),
                    port.kind.to_string(),
                    port.product.clone().unwrap_or_default(),
                ]);
            }
            println!("{out}");
        }
        OutputFormat::Pretty => {
            if ports.is_empty() {
                println!("No serial ports found.");
            }
            for port in ports {
                match &port.product {
                    Some(product) => println!("{} ({}, {product})", port.name, port.kind),
                    None => println!("{} ({})", port.name, port.kind),
                }
            }
        }
        OutputFormat::Raw => {
            for port in ports {
                println!("{}", port.name);
            }
        }
    }
}

fn display_opt<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
