//! # Credit intake driver
//!
//! Opens an edit session for one subject, applies a scripted set of field
//! changes and reference deletions, saves, and prints the save report as
//! JSON on stdout.
//!
//! ```text
//! credit-intake <subject_id> <edits.json>
//! ```
//!
//! The edits file holds `{"changes": {key: value, ...}, "delete_references": [id, ...]}`.
//! Changes are applied in file order. Configuration comes from the
//! `INTAKE_*` environment variables.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use credit_intake::support::init_file_tracing;
use credit_intake::{
    EditSession, Error, IntakeBackend, IntakeConfig, IntakeHttpClient, ReferenceId, Result,
    SchemaCache, SubjectId,
};
use error_stack::ResultExt;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Scripted edits read from the edits file
#[derive(Debug, Default, Deserialize)]
struct EditScript {
    #[serde(default)]
    changes:           Map<String, Value>,
    #[serde(default)]
    delete_references: Vec<ReferenceId>,
}

#[derive(Debug, Parser)]
#[command(name = "credit-intake")]
#[command(about = "Apply scripted edits to one subject's intake record and save")]
struct Cli {
    /// Subject whose record is edited
    subject: u64,
    /// JSON file with `changes` and `delete_references`
    edits:   PathBuf,
}

fn read_script(path: &Path) -> Result<EditScript> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::failed_to("read edits file", e))
        .attach(format!("Path: {}", path.display()))?;
    parse_script(&text)
}

fn parse_script(text: &str) -> Result<EditScript> {
    serde_json::from_str(text)
        .map_err(|e| error_stack::Report::new(Error::invalid("edits file", e)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = IntakeConfig::from_env()?;
    // Lazy file creation: nothing is written until the first event
    let _guard = init_file_tracing(config.log_level, config.log_filter.as_deref())?;

    let cli = Cli::parse();
    let subject = SubjectId(cli.subject);
    let script = read_script(&cli.edits)?;

    let backend: Arc<dyn IntakeBackend> = Arc::new(IntakeHttpClient::new(&config)?);
    let cache = SchemaCache::new(Arc::clone(&backend), config.schema_ttl);
    let cancel = CancellationToken::new();

    let mut session = EditSession::open(backend, &cache, &config, subject, &cancel).await?;

    let mut changes = Vec::with_capacity(script.changes.len());
    for (key, value) in script.changes {
        let outcome = session.apply_change(&key, value)?;
        changes.push(json!({"key": key, "path": outcome.path, "cleared": outcome.cleared}));
    }
    let mut deletions = Vec::with_capacity(script.delete_references.len());
    for identity in script.delete_references {
        deletions.push(session.delete_reference(identity, &cancel).await?);
    }

    let report = session.save(&cancel).await?;
    info!("Saved subject {subject}");

    let output = json!({"changes": changes, "deletions": deletions, "save": report});
    let rendered = serde_json::to_string_pretty(&output)
        .map_err(|e| Error::failed_to("render report", e))?;
    println!("{rendered}");
    Ok(())
}
