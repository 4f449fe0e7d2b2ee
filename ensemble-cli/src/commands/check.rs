//! `ensemble check`: load a schema file and show what it declares.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use ensemble_records::{config, RecordSpec};

/// Arguments for `ensemble check`.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Schema file path, or a name under ~/.ensemble/schemas/.
    pub schema: String,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct SchemaJson {
    name: String,
    slots: Vec<SlotJson>,
    dependencies: Vec<EdgeJson>,
}

#[derive(Serialize)]
struct SlotJson {
    name: String,
    required: Vec<String>,
    references: Vec<String>,
}

#[derive(Serialize)]
struct EdgeJson {
    from: String,
    to: String,
}

#[derive(Tabled)]
struct SlotTableRow {
    #[tabled(rename = "slot")]
    slot: String,
    #[tabled(rename = "required")]
    required: String,
    #[tabled(rename = "references")]
    references: String,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let path = config::locate_schema(&self.schema).context("could not locate schema file")?;
        let file = config::read_schema_file(&path)
            .with_context(|| format!("failed to load schema '{}'", self.schema))?;
        let builder = file
            .builder(&path)
            .with_context(|| format!("schema '{}' is invalid", self.schema))?;

        let specs = file.record_specs(&builder);
        let edges: Vec<EdgeJson> = builder
            .dependencies()
            .iter()
            .map(|(from, to)| EdgeJson {
                from: from.to_string(),
                to: to.to_string(),
            })
            .collect();

        let report = SchemaJson {
            name: file.name.clone(),
            slots: specs.iter().map(slot_json).collect(),
            dependencies: edges,
        };
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize schema JSON")?
            );
            return Ok(());
        }

        print_table(&report);
        Ok(())
    }
}

fn slot_json(spec: &RecordSpec) -> SlotJson {
    SlotJson {
        name: spec.slot.to_string(),
        required: spec.required.clone(),
        references: spec.references.iter().map(ToString::to_string).collect(),
    }
}

fn print_table(report: &SchemaJson) {
    println!(
        "{} {} | {} slots | {} dependencies",
        "■".green().bold(),
        report.name.bold(),
        report.slots.len(),
        report.dependencies.len(),
    );

    let rows: Vec<SlotTableRow> = report
        .slots
        .iter()
        .map(|slot| SlotTableRow {
            slot: slot.name.clone(),
            required: join_or_dash(&slot.required),
            references: join_or_dash(&slot.references),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    for edge in &report.dependencies {
        println!("  {} -> {}", edge.from, edge.to);
    }
}

fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}
