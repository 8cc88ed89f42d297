//! Framework-neutral WASM <-> JavaScript bridge for the CSV export.

use bfdr_core::{BirthRecord, ExtractionConfig};
use bfdr_fhir::ExportError;
use serde::Deserialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

#[derive(Deserialize)]
struct JsExtractionConfig {
    #[serde(default)]
    pregnancy_horizon_months: Option<u32>,
    #[serde(default)]
    annotate_sources: Option<bool>,
}

impl From<JsExtractionConfig> for ExtractionConfig {
    fn from(cfg: JsExtractionConfig) -> Self {
        let mut base = ExtractionConfig::default();
        if let Some(months) = cfg.pregnancy_horizon_months {
            base.pregnancy_horizon_months = months;
        }
        if let Some(annotate) = cfg.annotate_sources {
            base.annotate_sources = annotate;
        }
        base
    }
}

fn read_config(config: Option<JsValue>) -> Result<ExtractionConfig, JsValue> {
    match config {
        Some(js_cfg) if !js_cfg.is_undefined() && !js_cfg.is_null() => {
            let cfg: JsExtractionConfig = from_value(js_cfg)
                .map_err(|err| JsValue::from_str(&format!("Cannot read config: {err}")))?;
            Ok(ExtractionConfig::from(cfg))
        }
        _ => Ok(ExtractionConfig::default()),
    }
}

/// CSV document for an array of saved birth records.
#[wasm_bindgen]
pub fn export_csv(records: JsValue, config: Option<JsValue>) -> Result<String, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let records = from_value::<Vec<BirthRecord>>(records)
        .map_err(|err| JsValue::from_str(&format!("Cannot read birth records: {err}")))?;
    let cfg = read_config(config)?;

    bfdr_fhir::export_csv(&records, &cfg).map_err(|err| JsValue::from_str(&format_export_error(err)))
}

/// One row of derived values (`null` where nothing was found) for a single record.
#[wasm_bindgen]
pub fn derive_row(record: JsValue, config: Option<JsValue>) -> Result<JsValue, JsValue> {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();

    let record = from_value::<BirthRecord>(record)
        .map_err(|err| JsValue::from_str(&format!("Cannot read birth record: {err}")))?;
    let cfg = read_config(config)?;

    to_value(&bfdr_fhir::derive_row(&record, &cfg))
        .map_err(|err| JsValue::from_str(&format!("Cannot serialize row: {err}")))
}

#[wasm_bindgen]
pub fn column_labels() -> Result<JsValue, JsValue> {
    to_value(&bfdr_fhir::column_labels())
        .map_err(|err| JsValue::from_str(&format!("Cannot serialize columns: {err}")))
}

fn format_export_error(err: ExportError) -> String {
    format!("Export error: {err}")
}
