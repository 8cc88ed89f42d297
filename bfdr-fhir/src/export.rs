//! Tabular projection of birth records into CSV.

use std::io::Write;

use bfdr_core::{BirthRecord, ExtractionConfig};
use tracing::debug;

use crate::rules::Field;
use crate::view::RecordView;

/// One output column: header text, the field behind it, and whether the
/// provenance note is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub label: &'static str,
    pub field: Field,
    pub annotate: bool,
}

const fn col(label: &'static str, field: Field) -> Column {
    Column {
        label,
        field,
        annotate: false,
    }
}

const fn annotated(label: &'static str, field: Field) -> Column {
    Column {
        label,
        field,
        annotate: true,
    }
}

pub const COLUMNS: &[Column] = &[
    col("Child First Name", Field::ChildFirstName),
    col("Child Last Name", Field::ChildLastName),
    col("Child Sex", Field::ChildSex),
    col("Child MRN(s)", Field::ChildMrns),
    annotated("Child DoB/Delivery Date", Field::DeliveryDate),
    annotated("Child Birth Weight", Field::ChildBirthWeight),
    col("Mother First Name", Field::MotherFirstName),
    col("Mother Last Name", Field::MotherLastName),
    col("Mother MRN(s)", Field::MotherMrns),
    col("Primary Payment Source", Field::PrimaryPaymentSource),
    col("Mother Race", Field::MotherRace),
    col("Mother Height", Field::MotherHeight),
    col("Mother Ethnicity", Field::MotherEthnicity),
    col("Mother Address", Field::MotherAddress),
    col("Mother Birth Date", Field::MotherBirthDate),
    annotated("Mother Pre-Pregnancy Weight", Field::MotherPrePregnancyWeight),
    annotated("Mother Weight at Delivery", Field::MotherDeliveryWeight),
    col("APGAR Score 1 Minute", Field::ApgarOneMinute),
    col("APGAR Score 5 Minutes", Field::ApgarFiveMinutes),
    col("APGAR Score 10 Minutes", Field::ApgarTenMinutes),
    col("Infant Living?", Field::InfantLiving),
    annotated("Pre-Pregnancy Diabetes", Field::PrePregnancyDiabetes),
    annotated("Pre-Pregnancy Hypertension", Field::PrePregnancyHypertension),
    annotated("Gestational Diabetes", Field::GestationalDiabetes),
    annotated("Gestational Hypertension", Field::GestationalHypertension),
    annotated("Eclampsia", Field::Eclampsia),
    annotated("Previous Preterm Birth", Field::PreviousPretermBirth),
    annotated("Induction of Labor", Field::InductionOfLabor),
    annotated("Augmentation of Labor", Field::AugmentationOfLabor),
    annotated("Antibiotics Received by Mother During Labor", Field::LaborAntibiotics),
    annotated("Epidural", Field::Epidural),
    col("Fetal Presentation at Birth", Field::FetalPresentation),
    col("Final Route/Method of Delivery", Field::DeliveryRoute),
    col("Trial of Labor Attempted", Field::TrialOfLaborAttempted),
    annotated("Ruptured Uterus", Field::RupturedUterus),
    annotated("Maternal Transfusion", Field::MaternalTransfusion),
    annotated("Mother ICU Admission", Field::MotherIcuAdmission),
    annotated("Perineal Lacerations", Field::PerinealLacerations),
    annotated("Unplanned Hysterectomy", Field::UnplannedHysterectomy),
    annotated("NICU Admission", Field::NicuAdmission),
    annotated("Immediate Assisted Ventilation", Field::ImmediateAssistedVentilation),
    annotated("Assisted Ventilation (6 hrs)", Field::ProlongedAssistedVentilation),
    annotated("Surfactant Therapy", Field::SurfactantTherapy),
    annotated("Newborn Seizure Therapy", Field::NewbornSeizureTherapy),
    annotated("Newborn Antibiotics", Field::NewbornAntibiotics),
    col("Gestational Age", Field::GestationalAge),
    col("Plurality", Field::Plurality),
    col("Previous Cesareans", Field::PreviousCesareans),
    annotated("Congenital Anomalies NONE", Field::NoCongenitalAnomalies),
    annotated("Anencephaly", Field::Anencephaly),
    annotated("Mening/Spina Bifida", Field::SpinaBifida),
    annotated("CCHD", Field::Cchd),
    annotated("Diaphragmatic Hernia", Field::DiaphragmaticHernia),
    annotated("Omphalocele", Field::Omphalocele),
    annotated("Gastroschisis", Field::Gastroschisis),
    annotated("Limb Reduction", Field::LimbReduction),
    annotated("Cleft Palate Alone", Field::CleftPalate),
    // The header keeps its historical unbalanced parenthesis.
    annotated("Cleft Lip (w or w/o palate", Field::CleftLip),
    annotated("Hypospadias", Field::Hypospadias),
    annotated("Down Syndrome", Field::DownSyndrome),
    col("Down Syndrome Karyotype Confirmed", Field::DownSyndromeKaryotypeConfirmed),
    annotated("Chromosomal Anomaly", Field::ChromosomalAnomaly),
    col("Chromosomal Anomaly Karyotype Confirmed", Field::ChromosomalAnomalyKaryotypeConfirmed),
    col("Chlamydia Infection", Field::Chlamydia),
    col("Cytomeglovirus Infection", Field::Cytomegalovirus),
    col("Group B Strep Infection", Field::GroupBStrep),
    col("Herpes Infection", Field::Herpes),
    col("Gonorrhea Infection", Field::Gonorrhea),
    col("Hepatitis A Infection", Field::HepatitisA),
    col("Hepatitis B Infection", Field::HepatitisB),
    col("Hepatitis C Infection", Field::HepatitisC),
    col("HIV/AIDS Infection", Field::HivAids),
    col("Syphilis Infection", Field::Syphilis),
    col("Zika Infection", Field::Zika),
];

pub fn column_labels() -> Vec<&'static str> {
    COLUMNS.iter().map(|column| column.label).collect()
}

/// One value per column; `None` for fields nothing could be derived for.
pub fn derive_row(record: &BirthRecord, config: &ExtractionConfig) -> Vec<Option<String>> {
    let view = RecordView::new(&record.artifacts, config);
    COLUMNS
        .iter()
        .map(|column| {
            view.field(column.field)
                .render(column.annotate && config.annotate_sources)
        })
        .collect()
}

/// Records that finished collection, in input order.
pub fn exportable(records: &[BirthRecord]) -> impl Iterator<Item = &BirthRecord> {
    records.iter().filter(|record| record.status.is_settled())
}

/// Writes the header and one row per settled record; returns the row count.
pub fn write_csv<W: Write>(
    records: &[BirthRecord],
    config: &ExtractionConfig,
    output: W,
) -> Result<usize, ExportError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(output);

    writer.write_record(COLUMNS.iter().map(|column| column.label))?;

    let mut rows = 0;
    for record in exportable(records) {
        let row = derive_row(record, config);
        writer.write_record(row.iter().map(|value| value.as_deref().unwrap_or_default()))?;
        rows += 1;
        debug!(child_mrn = %record.child_mrn, status = %record.status, "exported row");
    }

    writer.flush()?;
    Ok(rows)
}

/// Whole CSV document as a string.
pub fn export_csv(records: &[BirthRecord], config: &ExtractionConfig) -> Result<String, ExportError> {
    let mut buffer = Vec::new();
    write_csv(records, config, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error while writing CSV: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV output is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
    #[error("invalid records JSON: {0}")]
    Parse(#[from] serde_json::Error),
}
