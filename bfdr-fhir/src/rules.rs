//! Field rules as data: every exported field maps to one descriptor that
//! [`crate::RecordView::field`] interprets.

use bfdr_core::{ArtifactLabel, PatientRole};
use serde::{Deserialize, Serialize};

use crate::matcher::{ConceptPath, SNOMED};

/// Every value the extractor can derive for a birth record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    ChildFirstName,
    ChildLastName,
    ChildSex,
    ChildMrns,
    DeliveryDate,
    ChildBirthWeight,
    MotherFirstName,
    MotherLastName,
    MotherMrns,
    PrimaryPaymentSource,
    MotherRace,
    MotherHeight,
    MotherEthnicity,
    MotherAddress,
    MotherBirthDate,
    MotherPrePregnancyWeight,
    MotherDeliveryWeight,
    ApgarOneMinute,
    ApgarFiveMinutes,
    ApgarTenMinutes,
    InfantLiving,
    PrePregnancyDiabetes,
    PrePregnancyHypertension,
    GestationalDiabetes,
    GestationalHypertension,
    Eclampsia,
    PreviousPretermBirth,
    InductionOfLabor,
    AugmentationOfLabor,
    LaborAntibiotics,
    Epidural,
    FetalPresentation,
    DeliveryRoute,
    TrialOfLaborAttempted,
    RupturedUterus,
    MaternalTransfusion,
    MotherIcuAdmission,
    PerinealLacerations,
    UnplannedHysterectomy,
    NicuAdmission,
    ImmediateAssistedVentilation,
    ProlongedAssistedVentilation,
    SurfactantTherapy,
    NewbornSeizureTherapy,
    NewbornAntibiotics,
    GestationalAge,
    Plurality,
    PreviousCesareans,
    NoCongenitalAnomalies,
    Anencephaly,
    SpinaBifida,
    Cchd,
    DiaphragmaticHernia,
    Omphalocele,
    Gastroschisis,
    LimbReduction,
    CleftPalate,
    CleftLip,
    Hypospadias,
    DownSyndrome,
    DownSyndromeKaryotypeConfirmed,
    ChromosomalAnomaly,
    ChromosomalAnomalyKaryotypeConfirmed,
    Chlamydia,
    Cytomegalovirus,
    GroupBStrep,
    Herpes,
    Gonorrhea,
    HepatitisA,
    HepatitisB,
    HepatitisC,
    HivAids,
    Syphilis,
    Zika,
}

/// Resource family a fallback step reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Observations,
    Conditions,
    Procedures,
}

impl SourceKind {
    /// Observations carry their concept in `valueCodeableConcept`, the rest under `code`.
    pub const fn path(self) -> ConceptPath {
        match self {
            SourceKind::Observations => ConceptPath::ObservationValue,
            SourceKind::Conditions | SourceKind::Procedures => ConceptPath::Code,
        }
    }
}

/// One step of a coded fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Source {
    pub label: ArtifactLabel,
    pub kind: SourceKind,
    pub provenance: &'static str,
}

impl Source {
    pub const fn observations(label: ArtifactLabel, provenance: &'static str) -> Self {
        Self {
            label,
            kind: SourceKind::Observations,
            provenance,
        }
    }

    pub const fn conditions(label: ArtifactLabel, provenance: &'static str) -> Self {
        Self {
            label,
            kind: SourceKind::Conditions,
            provenance,
        }
    }

    pub const fn procedures(label: ArtifactLabel, provenance: &'static str) -> Self {
        Self {
            label,
            kind: SourceKind::Procedures,
            provenance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Display of the first matching coding.
    First,
    /// Displays of every matching coding, joined with `", "`.
    All,
}

/// Coded lookup walked code-major: the whole chain runs for the first code
/// before the next code is tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodedRule {
    pub codes: &'static [&'static str],
    pub system: Option<&'static str>,
    pub sources: &'static [Source],
    pub selection: Selection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowFilter {
    Unbounded,
    DuringPregnancy,
    BeforePregnancy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pick {
    Earliest,
    Latest,
}

/// A dedicated observation label whose values all count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecificMeasurement {
    pub label: ArtifactLabel,
    pub provenance: &'static str,
}

/// A general observation label narrowed by window and picked by time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneralMeasurement {
    pub label: ArtifactLabel,
    pub window: WindowFilter,
    pub pick: Pick,
    /// Prefix of the provenance note; the chosen timestamp is appended.
    pub provenance: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementRule {
    pub specific: Option<SpecificMeasurement>,
    pub general: Option<GeneralMeasurement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Quantity,
    Integer,
    Boolean,
}

/// Every observation under one label, values joined with `", "`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationValueRule {
    pub label: ArtifactLabel,
    pub kind: ValueKind,
}

/// Karyotype confirmation for an anomaly field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KaryotypeRule {
    pub anomaly: Field,
    pub label: ArtifactLabel,
    pub confirming_code: &'static str,
}

/// Fields with bespoke logic, evaluated in [`crate::composite`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Composite {
    FirstName(PatientRole),
    LastName(PatientRole),
    Sex(PatientRole),
    Mrns(PatientRole),
    BirthDate(PatientRole),
    Address(PatientRole),
    Race(PatientRole),
    Ethnicity(PatientRole),
    DeliveryDate,
    PaymentSource,
    FetalPresentation,
    DeliveryRoute,
    TrialOfLabor,
    Karyotype(KaryotypeRule),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Coded(CodedRule),
    Measurement(MeasurementRule),
    ObservationValue(ObservationValueRule),
    Composite(Composite),
}

pub const CESAREAN: &str = "11466000";
pub const ROUTE_CODES: &[&str] = &["48782003", "302383004", "61586001", CESAREAN, "261665006"];
pub const PRESENTATION_CODES: &[&str] = &["6096002", "70028003", "394841004", "261665006", "163518000"];

const MOTHER_CONDITIONS: Source = Source::conditions(ArtifactLabel::MotherConditions, "Mother's Conditions");
const CHILD_CONDITIONS: Source = Source::conditions(ArtifactLabel::ChildConditions, "Child's Conditions");
const CHILD_PROCEDURES: Source = Source::procedures(ArtifactLabel::ChildProcedures, "Child's Procedures");

const RISK_FACTOR_SOURCES: &[Source] = &[
    Source::observations(ArtifactLabel::MotherRiskFactors, "Mother's Risk Factors Observations"),
    MOTHER_CONDITIONS,
];

const LABOR_SOURCES: &[Source] = &[
    Source::observations(
        ArtifactLabel::LaborDeliveryCharacteristics,
        "Characteristics of Labor/Delivery Observations",
    ),
    Source::procedures(ArtifactLabel::MotherProcedures, "Procedures"),
];

const MORBIDITY_SOURCES: &[Source] = &[
    Source::observations(ArtifactLabel::MaternalMorbidity, "Maternal Morbidity observations"),
    MOTHER_CONDITIONS,
    Source::procedures(ArtifactLabel::MotherProcedures, "Mother's Procedures"),
];

const NEWBORN_SOURCES: &[Source] = &[
    Source::observations(
        ArtifactLabel::AbnormalNewbornConditions,
        "Abnormal Newborn Condition observations",
    ),
    CHILD_CONDITIONS,
    CHILD_PROCEDURES,
];

const ANOMALY_SOURCES: &[Source] = &[
    Source::observations(ArtifactLabel::CongenitalAnomalies, "Congenital Anomalies observations"),
    CHILD_CONDITIONS,
    CHILD_PROCEDURES,
];

const INFECTION_SOURCES: &[Source] = &[
    Source::observations(
        ArtifactLabel::InfectionsDuringPregnancy,
        "Infections During Pregnancy observations",
    ),
    MOTHER_CONDITIONS,
];

const fn first(codes: &'static [&'static str], sources: &'static [Source]) -> Rule {
    Rule::Coded(CodedRule {
        codes,
        system: Some(SNOMED),
        sources,
        selection: Selection::First,
    })
}

const fn all(
    codes: &'static [&'static str],
    system: Option<&'static str>,
    sources: &'static [Source],
) -> Rule {
    Rule::Coded(CodedRule {
        codes,
        system,
        sources,
        selection: Selection::All,
    })
}

const fn observation_value(label: ArtifactLabel, kind: ValueKind) -> Rule {
    Rule::ObservationValue(ObservationValueRule { label, kind })
}

const GENERAL_WEIGHT: &str = "general weight observations on";
/// Delivery weight's fallback is worded without "on".
const GENERAL_DELIVERY_WEIGHT: &str = "general weight observations";

impl Field {
    /// Descriptor that derives this field.
    pub fn rule(self) -> Rule {
        use Composite as C;
        use PatientRole::{Child, Mother};

        match self {
            Field::ChildFirstName => Rule::Composite(C::FirstName(Child)),
            Field::ChildLastName => Rule::Composite(C::LastName(Child)),
            Field::ChildSex => Rule::Composite(C::Sex(Child)),
            Field::ChildMrns => Rule::Composite(C::Mrns(Child)),
            Field::DeliveryDate => Rule::Composite(C::DeliveryDate),
            Field::ChildBirthWeight => Rule::Measurement(MeasurementRule {
                specific: Some(SpecificMeasurement {
                    label: ArtifactLabel::ChildBirthWeight,
                    provenance: "birth weight observation",
                }),
                general: Some(GeneralMeasurement {
                    label: ArtifactLabel::ChildWeight,
                    window: WindowFilter::Unbounded,
                    pick: Pick::Earliest,
                    provenance: GENERAL_WEIGHT,
                }),
            }),
            Field::MotherFirstName => Rule::Composite(C::FirstName(Mother)),
            Field::MotherLastName => Rule::Composite(C::LastName(Mother)),
            Field::MotherMrns => Rule::Composite(C::Mrns(Mother)),
            Field::PrimaryPaymentSource => Rule::Composite(C::PaymentSource),
            Field::MotherRace => Rule::Composite(C::Race(Mother)),
            Field::MotherHeight => Rule::Measurement(MeasurementRule {
                specific: None,
                general: Some(GeneralMeasurement {
                    label: ArtifactLabel::MotherHeight,
                    window: WindowFilter::Unbounded,
                    pick: Pick::Latest,
                    provenance: "height observations on",
                }),
            }),
            Field::MotherEthnicity => Rule::Composite(C::Ethnicity(Mother)),
            Field::MotherAddress => Rule::Composite(C::Address(Mother)),
            Field::MotherBirthDate => Rule::Composite(C::BirthDate(Mother)),
            Field::MotherPrePregnancyWeight => Rule::Measurement(MeasurementRule {
                specific: Some(SpecificMeasurement {
                    label: ArtifactLabel::MotherPrePregnancyWeight,
                    provenance: "pre-pregnancy weight observation",
                }),
                general: Some(GeneralMeasurement {
                    label: ArtifactLabel::MotherWeight,
                    window: WindowFilter::BeforePregnancy,
                    pick: Pick::Latest,
                    provenance: GENERAL_WEIGHT,
                }),
            }),
            Field::MotherDeliveryWeight => Rule::Measurement(MeasurementRule {
                specific: Some(SpecificMeasurement {
                    label: ArtifactLabel::MotherDeliveryWeight,
                    provenance: "delivery weight observation",
                }),
                general: Some(GeneralMeasurement {
                    label: ArtifactLabel::MotherWeight,
                    window: WindowFilter::DuringPregnancy,
                    pick: Pick::Latest,
                    provenance: GENERAL_DELIVERY_WEIGHT,
                }),
            }),
            Field::ApgarOneMinute => observation_value(ArtifactLabel::ApgarOneMinute, ValueKind::Quantity),
            Field::ApgarFiveMinutes => observation_value(ArtifactLabel::ApgarFiveMinutes, ValueKind::Quantity),
            Field::ApgarTenMinutes => observation_value(ArtifactLabel::ApgarTenMinutes, ValueKind::Quantity),
            Field::InfantLiving => observation_value(ArtifactLabel::InfantLiving, ValueKind::Boolean),

            Field::PrePregnancyDiabetes => first(&["73211009"], RISK_FACTOR_SOURCES),
            Field::PrePregnancyHypertension => first(&["38341003"], RISK_FACTOR_SOURCES),
            Field::GestationalDiabetes => first(&["11687002"], RISK_FACTOR_SOURCES),
            Field::GestationalHypertension => first(&["48194001"], RISK_FACTOR_SOURCES),
            Field::Eclampsia => first(&["15938005"], RISK_FACTOR_SOURCES),
            Field::PreviousPretermBirth => first(&["161765003"], RISK_FACTOR_SOURCES),

            Field::InductionOfLabor => first(&["236958009"], LABOR_SOURCES),
            Field::AugmentationOfLabor => first(&["237001001"], LABOR_SOURCES),
            Field::LaborAntibiotics => first(&["634771000124114"], LABOR_SOURCES),
            Field::Epidural => first(&["231064003"], LABOR_SOURCES),

            Field::FetalPresentation => Rule::Composite(C::FetalPresentation),
            Field::DeliveryRoute => Rule::Composite(C::DeliveryRoute),
            Field::TrialOfLaborAttempted => Rule::Composite(C::TrialOfLabor),

            Field::RupturedUterus => all(&["34430009"], Some(SNOMED), MORBIDITY_SOURCES),
            Field::MaternalTransfusion => all(&["116859006"], Some(SNOMED), MORBIDITY_SOURCES),
            Field::MotherIcuAdmission => all(&["309904001"], Some(SNOMED), MORBIDITY_SOURCES),
            Field::PerinealLacerations => all(&["398019008"], Some(SNOMED), MORBIDITY_SOURCES),
            Field::UnplannedHysterectomy => all(&["625654015"], Some(SNOMED), MORBIDITY_SOURCES),

            Field::NicuAdmission => all(&["405269005"], Some(SNOMED), NEWBORN_SOURCES),
            // PHIN codes arrive under inconsistent systems.
            Field::ImmediateAssistedVentilation => all(&["PHC1250"], None, NEWBORN_SOURCES),
            Field::ProlongedAssistedVentilation => all(&["PHC1251"], None, NEWBORN_SOURCES),
            Field::SurfactantTherapy => all(&["43470100012410"], Some(SNOMED), NEWBORN_SOURCES),
            Field::NewbornSeizureTherapy => all(&["91175000"], Some(SNOMED), NEWBORN_SOURCES),
            Field::NewbornAntibiotics => all(&["434621000124103"], Some(SNOMED), NEWBORN_SOURCES),

            Field::GestationalAge => observation_value(ArtifactLabel::GestationalAge, ValueKind::Quantity),
            Field::Plurality => observation_value(ArtifactLabel::MultipleBirthIndicator, ValueKind::Integer),
            Field::PreviousCesareans => observation_value(ArtifactLabel::PreviousCesareans, ValueKind::Integer),

            Field::NoCongenitalAnomalies => all(&["260413007"], Some(SNOMED), ANOMALY_SOURCES),
            Field::Anencephaly => all(&["89369001"], Some(SNOMED), ANOMALY_SOURCES),
            Field::SpinaBifida => all(&["67531005"], Some(SNOMED), ANOMALY_SOURCES),
            Field::Cchd => all(&["12770006"], Some(SNOMED), ANOMALY_SOURCES),
            Field::DiaphragmaticHernia => all(&["17190001"], Some(SNOMED), ANOMALY_SOURCES),
            Field::Omphalocele => all(&["18735004"], Some(SNOMED), ANOMALY_SOURCES),
            Field::Gastroschisis => all(&["72951007"], Some(SNOMED), ANOMALY_SOURCES),
            Field::LimbReduction => all(&["67341007"], Some(SNOMED), ANOMALY_SOURCES),
            Field::CleftPalate => all(&["87979003"], Some(SNOMED), ANOMALY_SOURCES),
            Field::CleftLip => all(&["80281008"], Some(SNOMED), ANOMALY_SOURCES),
            Field::Hypospadias => all(&["416010008"], Some(SNOMED), ANOMALY_SOURCES),
            Field::DownSyndrome => all(&["70156005"], Some(SNOMED), ANOMALY_SOURCES),
            Field::DownSyndromeKaryotypeConfirmed => Rule::Composite(C::Karyotype(KaryotypeRule {
                anomaly: Field::DownSyndrome,
                label: ArtifactLabel::DownSyndromeKaryotype,
                confirming_code: "442124003",
            })),
            // Shares the Down syndrome code; kept as received.
            Field::ChromosomalAnomaly => all(&["70156005"], Some(SNOMED), ANOMALY_SOURCES),
            Field::ChromosomalAnomalyKaryotypeConfirmed => Rule::Composite(C::Karyotype(KaryotypeRule {
                anomaly: Field::ChromosomalAnomaly,
                label: ArtifactLabel::ChromosomalAnomalyKaryotype,
                confirming_code: "312948004",
            })),

            Field::Chlamydia => all(&["105629000"], Some(SNOMED), INFECTION_SOURCES),
            Field::Cytomegalovirus => all(&["28944009"], Some(SNOMED), INFECTION_SOURCES),
            Field::GroupBStrep => all(&["426933007"], Some(SNOMED), INFECTION_SOURCES),
            Field::Herpes => all(&["33839006"], Some(SNOMED), INFECTION_SOURCES),
            Field::Gonorrhea => all(&["1562800"], Some(SNOMED), INFECTION_SOURCES),
            Field::HepatitisA => all(&["40468003"], Some(SNOMED), INFECTION_SOURCES),
            Field::HepatitisB => all(&["66071002"], Some(SNOMED), INFECTION_SOURCES),
            Field::HepatitisC => all(&["50711007"], Some(SNOMED), INFECTION_SOURCES),
            Field::HivAids => all(&["165816005", "86406008", "62479008"], Some(SNOMED), INFECTION_SOURCES),
            Field::Syphilis => all(&["76272004"], Some(SNOMED), INFECTION_SOURCES),
            Field::Zika => all(&["762725007", "3928002"], Some(SNOMED), INFECTION_SOURCES),
        }
    }
}
