//! `ensemble validate`: run aggregate validation over JSON attributes.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use ensemble_core::{Ensemble, SlotName};

use super::{load_schema, print_reports_json, print_reports_table, read_bundle, slot_reports};

/// Arguments for `ensemble validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Schema file path, or a name under ~/.ensemble/schemas/.
    pub schema: String,

    /// JSON file mapping slot names to attribute objects.
    #[arg(long)]
    pub input: PathBuf,

    /// Validation context passed to every record (e.g. `create`).
    #[arg(long)]
    pub context: Option<String>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl ValidateArgs {
    pub fn run(self) -> Result<()> {
        let schema = load_schema(&self.schema, None)?;
        let bundle = read_bundle(&self.input)?;
        let ensemble = Ensemble::new(schema.clone(), bundle)
            .with_context(|| format!("failed to build aggregate '{}'", schema.name()))?;

        let invalid: Vec<SlotName> = match ensemble.validate(self.context.as_deref()) {
            Ok(()) => Vec::new(),
            Err(e) => e.invalid_slots().to_vec(),
        };
        let reports = slot_reports(&ensemble, |slot, _, _| {
            if invalid.contains(slot) {
                "invalid"
            } else {
                "valid"
            }
        });

        if self.json {
            print_reports_json(schema.name(), invalid.is_empty(), false, &reports)?;
        } else {
            print_reports_table(&reports);
            if invalid.is_empty() {
                println!("{} {} is valid", "■".green().bold(), schema.name());
            }
        }

        if !invalid.is_empty() {
            let names: Vec<&str> = invalid.iter().map(SlotName::as_str).collect();
            bail!(
                "aggregate '{}' is invalid: {}",
                schema.name(),
                names.join(", ")
            );
        }
        Ok(())
    }
}
