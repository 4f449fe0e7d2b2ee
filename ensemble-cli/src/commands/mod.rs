pub mod check;
pub mod save;
pub mod validate;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::Value;
use tabled::Tabled;

use ensemble_core::{AttributeBundle, Ensemble, Schema, SlotName};
use ensemble_records::{config, Record, RecordStore};

/// Resolve `arg` to a schema file and build it, binding records to `store`.
pub fn load_schema(arg: &str, store: Option<Arc<RecordStore>>) -> Result<Arc<Schema>> {
    let path = config::locate_schema(arg).context("could not locate schema file")?;
    let schema = config::load_schema_file(&path, store)
        .with_context(|| format!("failed to load schema '{arg}'"))?;
    Ok(Arc::new(schema))
}

/// Read a JSON object mapping slot names to attribute objects.
pub fn read_bundle(path: &Path) -> Result<AttributeBundle> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read input {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("input {} is not valid JSON", path.display()))?;
    match value {
        Value::Object(slots) => Ok(AttributeBundle::from(slots)),
        _ => bail!(
            "input {} must be a JSON object keyed by slot name",
            path.display()
        ),
    }
}

/// Outcome of one slot after validation or save.
#[derive(Debug, Serialize)]
pub struct SlotReport {
    pub slot: String,
    pub status: &'static str,
    pub id: Option<u64>,
    pub errors: Vec<String>,
}

#[derive(Tabled)]
pub struct SlotRow {
    #[tabled(rename = "slot")]
    slot: String,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "id")]
    id: String,
    #[tabled(rename = "errors")]
    errors: String,
}

impl From<&SlotReport> for SlotRow {
    fn from(report: &SlotReport) -> Self {
        Self {
            slot: report.slot.clone(),
            status: report.status.to_uppercase(),
            id: report.id.map_or_else(|| "-".to_string(), |id| id.to_string()),
            errors: report.errors.join("; "),
        }
    }
}

/// One report per slot in declaration order.
///
/// `status` picks the label from the slot name, its record id and errors.
pub fn slot_reports<F>(ensemble: &Ensemble, status: F) -> Vec<SlotReport>
where
    F: Fn(&SlotName, Option<u64>, &[String]) -> &'static str,
{
    ensemble
        .iter()
        .map(|(slot, model)| {
            let (id, errors) = match model.downcast_ref::<Record>() {
                Some(record) => (record.id(), record.errors().to_vec()),
                None => (None, Vec::new()),
            };
            SlotReport {
                slot: slot.to_string(),
                status: status(slot, id, &errors),
                id,
                errors,
            }
        })
        .collect()
}

/// `forced` marks a `save --force` run, where `ok` only means the command
/// finished; per-slot `status` tells which records were actually written.
pub fn print_reports_json(
    schema: &str,
    ok: bool,
    forced: bool,
    reports: &[SlotReport],
) -> Result<()> {
    #[derive(Serialize)]
    struct Payload<'a> {
        schema: &'a str,
        ok: bool,
        forced: bool,
        slots: &'a [SlotReport],
    }

    let payload = Payload {
        schema,
        ok,
        forced,
        slots: reports,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize report JSON")?
    );
    Ok(())
}

pub fn print_reports_table(reports: &[SlotReport]) {
    let rows: Vec<SlotRow> = reports.iter().map(SlotRow::from).collect();
    let mut table = tabled::Table::new(rows);
    table.with(tabled::settings::Style::rounded());
    println!("{table}");
}
