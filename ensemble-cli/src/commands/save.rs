//! `ensemble save`: build an aggregate and persist every record.
//!
//! Without `--force` the save stops at the first record that fails to
//! save and the command exits non-zero. With `--force` every record is
//! attempted and failures are only reported.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use ensemble_core::Ensemble;
use ensemble_records::RecordStore;

use super::{load_schema, print_reports_json, print_reports_table, read_bundle, slot_reports};

/// Arguments for `ensemble save`.
#[derive(Args, Debug)]
pub struct SaveArgs {
    /// Schema file path, or a name under ~/.ensemble/schemas/.
    pub schema: String,

    /// JSON file mapping slot names to attribute objects.
    #[arg(long)]
    pub input: PathBuf,

    /// Record store directory [default: ~/.ensemble/store].
    #[arg(long)]
    pub store: Option<PathBuf>,

    /// Attempt every record, ignoring failures.
    #[arg(long)]
    pub force: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl SaveArgs {
    pub fn run(self) -> Result<()> {
        let store = match self.store {
            Some(dir) => RecordStore::new(dir),
            None => RecordStore::open_default().context("could not open default record store")?,
        };
        let store = Arc::new(store);
        let schema = load_schema(&self.schema, Some(Arc::clone(&store)))?;
        let bundle = read_bundle(&self.input)?;

        let (ensemble, saved) = if self.force {
            let ensemble = Ensemble::force_create(schema.clone(), bundle)
                .with_context(|| format!("failed to build aggregate '{}'", schema.name()))?;
            (ensemble, true)
        } else {
            let ensemble = Ensemble::new(schema.clone(), bundle)
                .with_context(|| format!("failed to build aggregate '{}'", schema.name()))?;
            let saved = ensemble
                .save()
                .with_context(|| format!("failed to save aggregate '{}'", schema.name()))?;
            (ensemble, saved)
        };

        let reports = slot_reports(&ensemble, |_, id, errors| match (id, errors.is_empty()) {
            (Some(_), true) => "saved",
            (_, false) => "failed",
            (None, true) => "skipped",
        });

        if self.json {
            print_reports_json(schema.name(), saved, self.force, &reports)?;
        } else {
            print_reports_table(&reports);
            println!("Store: {}", store.root().display());
        }

        if !saved {
            bail!("aggregate '{}' was not saved", schema.name());
        }
        if !self.json && reports.iter().all(|r| r.status == "saved") {
            println!("{} {} saved", "■".green().bold(), schema.name());
        }
        Ok(())
    }
}
