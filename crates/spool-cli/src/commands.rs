use std::fs;
use std::path::Path;
use std::time::SystemTime;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use spool_store::{EnvelopeStore, FilesystemStore, StoreError};
use spool_transport::TransportConfig;
use spool_types::{AddressScheme, Envelope, Headers, StorageAddress};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let store = open_store(&cli)?;
    let format = cli.format;
    match cli.command {
        Command::Status => emit(format, &status_report(&store)?, print_status),
        Command::List(args) => emit(format, &list_rows(&store, args.limit)?, print_list),
        Command::Show(args) => emit(format, &show_envelope(&store, &args.address)?, print_show),
        Command::Verify => emit(format, &verify(&store)?, print_verify),
        Command::Remove(args) => emit(format, &remove(&store, &args.address)?, print_remove),
        Command::Purge(args) => {
            if !args.yes {
                bail!("refusing to delete every staged envelope without --yes");
            }
            emit(format, &purge(&store)?, print_purge)
        }
    }
}

fn open_store(cli: &Cli) -> anyhow::Result<FilesystemStore> {
    let config = match (&cli.dir, &cli.config) {
        (Some(dir), _) => TransportConfig::new(dir),
        (None, Some(path)) => TransportConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        (None, None) => TransportConfig::default(),
    };
    let root = config.resolved_storage_location()?;
    open_existing(&root, config.address_scheme)
}

/// Operator commands never create the directory or sweep a live writer's temp files.
fn open_existing(root: &Path, scheme: AddressScheme) -> anyhow::Result<FilesystemStore> {
    FilesystemStore::inspect(root, scheme)
        .with_context(|| format!("opening storage directory {}", root.display()))
}

fn emit<T: Serialize>(
    format: OutputFormat,
    value: &T,
    text: impl FnOnce(&T),
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => text(value),
    }
    Ok(())
}

fn parse_address(s: &str) -> anyhow::Result<StorageAddress> {
    StorageAddress::parse(s).with_context(|| format!("{s:?} is not a storage address"))
}

fn staged_at(store: &FilesystemStore, address: &StorageAddress) -> Option<String> {
    let modified: SystemTime = fs::metadata(store.path_for(address)).ok()?.modified().ok()?;
    Some(DateTime::<Utc>::from(modified).to_rfc3339())
}

// ---- Reports ----

#[derive(Debug, Serialize)]
struct StatusReport {
    root: String,
    scheme: AddressScheme,
    records: usize,
    bytes: u64,
}

#[derive(Debug, Serialize)]
struct ListRow {
    address: String,
    /// `None` when the file does not deserialize.
    item_types: Option<Vec<String>>,
    size: u64,
    staged_at: Option<String>,
}

#[derive(Debug, Serialize)]
struct ItemSummary {
    item_type: String,
    length: usize,
    headers: Headers,
}

#[derive(Debug, Serialize)]
struct EnvelopeView {
    address: String,
    staged_at: Option<String>,
    event_id: Option<String>,
    diagnostic_only: bool,
    headers: Headers,
    items: Vec<ItemSummary>,
}

#[derive(Debug, Serialize)]
struct VerifyReport {
    loaded: usize,
    healed: Vec<String>,
    skipped: Vec<String>,
}

#[derive(Debug, Serialize)]
struct RemoveReport {
    address: String,
    removed: bool,
}

#[derive(Debug, Serialize)]
struct PurgeReport {
    removed: usize,
}

fn status_report(store: &FilesystemStore) -> anyhow::Result<StatusReport> {
    Ok(StatusReport {
        root: store.root().display().to_string(),
        scheme: store.scheme(),
        records: store.addresses()?.len(),
        bytes: store.total_bytes()?,
    })
}

fn list_rows(store: &FilesystemStore, limit: Option<usize>) -> anyhow::Result<Vec<ListRow>> {
    let addresses = store.addresses()?;
    let take = limit.unwrap_or(addresses.len());
    let mut rows = Vec::with_capacity(take.min(addresses.len()));

    for address in addresses.into_iter().take(take) {
        let item_types = match store.load(&address) {
            Ok(Some(envelope)) => Some(item_types(&envelope)),
            // Removed since it was listed.
            Ok(None) => continue,
            Err(StoreError::Corrupt { .. }) => None,
            Err(e) => return Err(e.into()),
        };
        rows.push(ListRow {
            size: fs::metadata(store.path_for(&address)).map(|m| m.len()).unwrap_or(0),
            staged_at: staged_at(store, &address),
            address: address.to_string(),
            item_types,
        });
    }
    Ok(rows)
}

fn item_types(envelope: &Envelope) -> Vec<String> {
    envelope
        .items()
        .iter()
        .map(|item| item.item_type().to_string())
        .collect()
}

fn show_envelope(store: &FilesystemStore, address: &str) -> anyhow::Result<EnvelopeView> {
    let address = parse_address(address)?;
    let Some(envelope) = store.load(&address)? else {
        bail!("no staged envelope at {address}");
    };

    Ok(EnvelopeView {
        staged_at: staged_at(store, &address),
        address: address.to_string(),
        event_id: envelope.event_id().map(str::to_string),
        diagnostic_only: envelope.is_diagnostic_only(),
        headers: envelope.headers().clone(),
        items: envelope
            .items()
            .iter()
            .map(|item| ItemSummary {
                item_type: item.item_type().to_string(),
                length: item.payload().len(),
                headers: item.headers().clone(),
            })
            .collect(),
    })
}

fn verify(store: &FilesystemStore) -> anyhow::Result<VerifyReport> {
    let report = store.scan()?;
    Ok(VerifyReport {
        loaded: report.loaded.len(),
        healed: report.healed.iter().map(ToString::to_string).collect(),
        skipped: report.skipped,
    })
}

fn remove(store: &FilesystemStore, address: &str) -> anyhow::Result<RemoveReport> {
    let address = parse_address(address)?;
    let removed = store.remove_address(&address)?;
    Ok(RemoveReport {
        address: address.to_string(),
        removed,
    })
}

fn purge(store: &FilesystemStore) -> anyhow::Result<PurgeReport> {
    let mut removed = 0;
    for address in store.addresses()? {
        if store.remove_address(&address)? {
            removed += 1;
        }
    }
    Ok(PurgeReport { removed })
}

// ---- Text output ----

fn print_status(report: &StatusReport) {
    println!("Storage: {}", report.root.bold());
    println!("Scheme: {}", format!("{:?}", report.scheme).cyan());
    println!(
        "Staged: {} envelopes, {} bytes",
        report.records.to_string().bold(),
        report.bytes
    );
}

fn print_list(rows: &Vec<ListRow>) {
    if rows.is_empty() {
        println!("No staged envelopes.");
        return;
    }
    for row in rows {
        let types = match &row.item_types {
            Some(types) => types.join(",").normal(),
            None => "corrupt".red().bold(),
        };
        println!(
            "{}  {:>8}  {}  {}",
            row.address.yellow(),
            row.size,
            row.staged_at.as_deref().unwrap_or("-").dimmed(),
            types
        );
    }
}

fn print_show(view: &EnvelopeView) {
    println!("Envelope {}", view.address.yellow().bold());
    if let Some(id) = &view.event_id {
        println!("  Event: {}", id.cyan());
    }
    if let Some(staged) = &view.staged_at {
        println!("  Staged: {staged}");
    }
    if view.diagnostic_only {
        println!("  {}", "diagnostic only".dimmed());
    }
    for (key, value) in &view.headers {
        println!("  {}: {}", key.bold(), value);
    }
    for (index, item) in view.items.iter().enumerate() {
        println!(
            "  [{index}] {} ({} bytes)",
            item.item_type.green(),
            item.length
        );
        for (key, value) in &item.headers {
            println!("      {}: {}", key, value);
        }
    }
}

fn print_verify(report: &VerifyReport) {
    for address in &report.healed {
        println!("  {} {}", "deleted corrupt:".red(), address);
    }
    for name in &report.skipped {
        println!("  {} {}", "skipped:".yellow(), name);
    }
    println!(
        "{} {} envelopes readable, {} deleted",
        "✓".green().bold(),
        report.loaded,
        report.healed.len()
    );
}

fn print_remove(report: &RemoveReport) {
    if report.removed {
        println!("{} Removed {}", "✓".green(), report.address.yellow());
    } else {
        println!("Nothing staged at {}", report.address.yellow());
    }
}

fn print_purge(report: &PurgeReport) {
    println!("{} Removed {} envelopes", "✓".green().bold(), report.removed);
}
