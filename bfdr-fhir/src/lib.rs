//! Derivation rules that turn fetched FHIR artifacts into birth-registration fields,
//! and the CSV projection over them.

use bfdr_core::{BirthRecord, ExtractionConfig};

mod composite;
mod extract;
pub mod export;
pub mod matcher;
pub mod relations;
pub mod rules;
pub mod temporal;
pub mod view;

pub use export::{column_labels, derive_row, export_csv, write_csv, Column, ExportError, COLUMNS};
pub use matcher::{CodeTarget, CodedValue, ConceptPath, LOINC, SNOMED};
pub use relations::{birth_parent_identifier, find_birth_parent, is_birth_parent};
pub use rules::Field;
pub use temporal::{classify_by_window, parse_fhir_datetime, resolve_delivery_date, WindowPartition};
pub use view::RecordView;

/// Parses a JSON array of saved birth records.
pub fn records_from_str(records_json: &str) -> Result<Vec<BirthRecord>, ExportError> {
    Ok(serde_json::from_str(records_json)?)
}

/// CSV for a JSON array of saved birth records.
pub fn export_csv_str(records_json: &str, config: &ExtractionConfig) -> Result<String, ExportError> {
    let records = records_from_str(records_json)?;
    export_csv(&records, config)
}
