use std::io::{self, Write};

use serde::Serialize;
use tracing::info;

use crate::app::{ModelSummary, ProgressEvent, ProgressSink, QueryResult};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Json,
    Text,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_summary(summary: &ModelSummary) -> io::Result<()> {
        Self::print_json(summary)
    }

    pub fn print_query(result: &QueryResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Forwards progress events to the log.
pub struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => info!(elapsed_ms = elapsed.as_millis() as u64, "{}", event.message),
            None => info!("{}", event.message),
        }
    }
}

pub fn print_summary_text(summary: &ModelSummary) {
    let green = "\x1b[32m";
    let yellow = "\x1b[33m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}KIRA-BD directory model{reset}");
    println!(
        "{green}biobanks: {}  collections: {}  contacts: {}  networks: {}  facts: {}{reset}",
        summary.entities.biobanks,
        summary.entities.collections,
        summary.entities.contacts,
        summary.entities.networks,
        summary.entities.facts
    );
    println!(
        "withdrawn biobanks: {}  withdrawn collections: {}",
        summary.withdrawn_biobanks, summary.withdrawn_collections
    );
    for graph in &summary.graphs {
        let color = if graph.repaired > 0 { yellow } else { green };
        println!(
            "{color}{:<10} nodes={:<7} edges={:<7} repaired={}{reset}",
            graph.graph.to_string(),
            graph.nodes,
            graph.edges,
            graph.repaired
        );
    }
    for item in &summary.fetched {
        println!("  {} {} ({})", item.kind, item.records, item.action);
    }
}
