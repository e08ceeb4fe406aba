use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The five manifest ("bordereau") families tracked for an establishment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WasteCategory {
    /// Hazardous waste.
    #[serde(rename = "BSDD")]
    Bsdd,
    /// Asbestos.
    #[serde(rename = "BSDA")]
    Bsda,
    /// Refrigerant fluids.
    #[serde(rename = "BSFF")]
    Bsff,
    /// Medical waste.
    #[serde(rename = "BSDASRI")]
    Bsdasri,
    /// End-of-life vehicles.
    #[serde(rename = "BSVHU")]
    Bsvhu,
}

impl WasteCategory {
    pub const ALL: [WasteCategory; 5] = [
        WasteCategory::Bsdd,
        WasteCategory::Bsda,
        WasteCategory::Bsff,
        WasteCategory::Bsdasri,
        WasteCategory::Bsvhu,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            WasteCategory::Bsdd => "BSDD",
            WasteCategory::Bsda => "BSDA",
            WasteCategory::Bsff => "BSFF",
            WasteCategory::Bsdasri => "BSDASRI",
            WasteCategory::Bsvhu => "BSVHU",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            WasteCategory::Bsdd => "hazardous waste",
            WasteCategory::Bsda => "asbestos",
            WasteCategory::Bsff => "refrigerant fluids",
            WasteCategory::Bsdasri => "medical waste",
            WasteCategory::Bsvhu => "end-of-life vehicles",
        }
    }

    pub fn from_code(s: &str) -> Option<WasteCategory> {
        let upper = s.trim().to_uppercase();
        WasteCategory::ALL.into_iter().find(|c| c.code() == upper)
    }
}

impl fmt::Display for WasteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Lifecycle state of a manifest. Unknown upstream states map to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ManifestStatus {
    Initial,
    Draft,
    Sealed,
    SignedByProducer,
    SignedByEmitter,
    Sent,
    Received,
    Accepted,
    TempStored,
    TempStorerAccepted,
    Resealed,
    Resent,
    AwaitingGroup,
    Grouped,
    IntermediatelyProcessed,
    Processed,
    Refused,
    PartiallyRefused,
    NoTraceability,
    Canceled,
    #[serde(other)]
    Other,
}

impl ManifestStatus {
    /// Final states: the manifest no longer moves.
    pub fn is_archived(&self) -> bool {
        matches!(
            self,
            ManifestStatus::Processed | ManifestStatus::Refused | ManifestStatus::NoTraceability
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Acceptance {
    Accepted,
    Refused,
    PartiallyRefused,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportMode {
    Road,
    Rail,
    Air,
    River,
    Sea,
    #[serde(other)]
    Other,
}

/// Timestamp columns of a manifest that go through date validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DateField {
    CreatedAt,
    SentAt,
    ReceivedAt,
    ProcessedAt,
}

impl DateField {
    pub const ALL: [DateField; 4] = [
        DateField::CreatedAt,
        DateField::SentAt,
        DateField::ReceivedAt,
        DateField::ProcessedAt,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DateField::CreatedAt => "createdAt",
            DateField::SentAt => "sentAt",
            DateField::ReceivedAt => "receivedAt",
            DateField::ProcessedAt => "processedAt",
        }
    }
}

impl fmt::Display for DateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One manifest as delivered by the data source, generic over the timestamp
/// representation: raw strings before validation, UTC instants after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestRecord<T> {
    pub id: String,
    #[serde(rename = "wasteCode", default)]
    pub waste_code: String,
    #[serde(rename = "emitterCompanySiret", default)]
    pub emitter_siret: Option<String>,
    #[serde(rename = "recipientCompanySiret", default)]
    pub recipient_siret: Option<String>,
    #[serde(rename = "emitterCompanyAddress", default)]
    pub emitter_address: Option<String>,
    /// Postal code of the pickup work site, when declared separately.
    #[serde(rename = "emitterWorkSitePostalCode", default)]
    pub emitter_postal_code: Option<String>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<T>,
    #[serde(rename = "sentAt", default)]
    pub sent_at: Option<T>,
    #[serde(rename = "receivedAt", default)]
    pub received_at: Option<T>,
    #[serde(rename = "processedAt", default)]
    pub processed_at: Option<T>,
    /// Quantity declared by the emitter, in tons.
    #[serde(rename = "wasteDetailsQuantity", default)]
    pub declared_quantity: Option<Decimal>,
    /// Quantity weighed at reception, in tons.
    #[serde(rename = "quantityReceived", alias = "poids", default)]
    pub quantity_received: Option<Decimal>,
    #[serde(default = "default_status")]
    pub status: ManifestStatus,
    #[serde(rename = "wasteAcceptationStatus", default)]
    pub acceptance: Option<Acceptance>,
    #[serde(rename = "noTraceability", default)]
    pub no_traceability: bool,
    #[serde(
        rename = "processingOperation",
        alias = "processingOperationDone",
        default
    )]
    pub processing_operation: Option<String>,
    #[serde(rename = "transporterTransportMode", default)]
    pub transport_mode: Option<TransportMode>,
}

fn default_status() -> ManifestStatus {
    ManifestStatus::Other
}

/// Manifest before date validation.
pub type RawManifest = ManifestRecord<String>;

/// Manifest whose timestamps all parsed.
pub type Manifest = ManifestRecord<DateTime<Utc>>;

impl<T> ManifestRecord<T> {
    pub fn timestamp(&self, field: DateField) -> Option<&T> {
        match field {
            DateField::CreatedAt => self.created_at.as_ref(),
            DateField::SentAt => self.sent_at.as_ref(),
            DateField::ReceivedAt => self.received_at.as_ref(),
            DateField::ProcessedAt => self.processed_at.as_ref(),
        }
    }

    pub fn is_emitted_by(&self, siret: &str) -> bool {
        self.emitter_siret.as_deref() == Some(siret)
    }

    pub fn is_received_by(&self, siret: &str) -> bool {
        self.recipient_siret.as_deref() == Some(siret)
    }

    /// A manifest flagged without traceability is closed whatever its
    /// status says.
    pub fn is_archived(&self) -> bool {
        self.no_traceability || self.status.is_archived()
    }

    /// Weight counted when a manifest leaves the site: what the emitter
    /// declared, whatever was weighed on arrival.
    pub fn outgoing_weight(&self) -> Decimal {
        self.declared_quantity.unwrap_or_default()
    }

    pub fn received_weight(&self) -> Decimal {
        self.quantity_received.unwrap_or_default()
    }

    /// Rebuild the record with every timestamp converted by `f`.
    pub fn try_map_dates<U, E>(
        self,
        mut f: impl FnMut(DateField, T) -> Result<Option<U>, E>,
    ) -> Result<ManifestRecord<U>, E> {
        let mut convert = |field, value: Option<T>| match value {
            Some(v) => f(field, v),
            None => Ok(None),
        };
        Ok(ManifestRecord {
            created_at: convert(DateField::CreatedAt, self.created_at)?,
            sent_at: convert(DateField::SentAt, self.sent_at)?,
            received_at: convert(DateField::ReceivedAt, self.received_at)?,
            processed_at: convert(DateField::ProcessedAt, self.processed_at)?,
            id: self.id,
            waste_code: self.waste_code,
            emitter_siret: self.emitter_siret,
            recipient_siret: self.recipient_siret,
            emitter_address: self.emitter_address,
            emitter_postal_code: self.emitter_postal_code,
            declared_quantity: self.declared_quantity,
            quantity_received: self.quantity_received,
            status: self.status,
            acceptance: self.acceptance,
            no_traceability: self.no_traceability,
            processing_operation: self.processing_operation,
            transport_mode: self.transport_mode,
        })
    }
}

/// A correction request filed against a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionRecord {
    pub id: String,
    #[serde(rename = "manifestId", alias = "bsddId", alias = "bsdaId")]
    pub manifest_id: String,
    #[serde(rename = "authoringCompanyId", default)]
    pub authoring_company_id: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompanyType {
    Producer,
    Collector,
    Wasteprocessor,
    WasteCenter,
    Broker,
    Trader,
    Transporter,
    EcoOrganism,
    WasteVehicles,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptKind {
    TransporterReceipt,
    TraderReceipt,
    BrokerReceipt,
    VhuDemolisseurAgreement,
    VhuBroyeurAgreement,
}

/// A receipt or agreement the establishment declared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    pub kind: ReceiptKind,
    pub number: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(rename = "validityLimit", default)]
    pub validity_limit: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Establishment {
    pub siret: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
    /// Internal company id some sources use for revision authorship.
    #[serde(rename = "companyId", default)]
    pub company_id: Option<String>,
    #[serde(rename = "companyTypes", default)]
    pub company_types: Vec<CompanyType>,
    #[serde(rename = "createdAt", default)]
    pub created_at: Option<DateTime<Utc>>,
    /// S3IC/GUN classified-installation code.
    #[serde(rename = "codeS3ic", default)]
    pub s3ic_code: Option<String>,
    #[serde(default)]
    pub receipts: Vec<Receipt>,
}

impl Establishment {
    /// True when `company` designates this establishment, by SIRET or by
    /// internal id.
    pub fn is_same_company(&self, company: &str) -> bool {
        company == self.siret || self.company_id.as_deref() == Some(company)
    }
}

/// A classified-installation permit ("rubrique ICPE") with its authorized volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulatoryAuthorization {
    pub rubrique: String,
    #[serde(default)]
    pub alinea: Option<String>,
    #[serde(rename = "authorizedVolume")]
    pub authorized_volume: Decimal,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(rename = "validFrom", default)]
    pub valid_from: Option<NaiveDate>,
    #[serde(rename = "validUntil", default)]
    pub valid_until: Option<NaiveDate>,
}

fn default_unit() -> String {
    "t".to_string()
}

impl RegulatoryAuthorization {
    /// Code used for policy and mapping lookups, e.g. "2760-1".
    pub fn key(&self) -> String {
        match self.alinea.as_deref() {
            Some(a) if !a.trim().is_empty() => format!("{}-{}", self.rubrique.trim(), a.trim()),
            _ => self.rubrique.trim().to_string(),
        }
    }

    /// Whether activity mapped to `code` counts against this authorization.
    /// An authorization without alinea covers every alinea of its rubrique.
    pub fn covers(&self, code: &str) -> bool {
        if code == self.key() {
            return true;
        }
        self.alinea.is_none()
            && code
                .split_once('-')
                .is_some_and(|(rubrique, _)| rubrique == self.rubrique.trim())
    }

    pub fn in_force_on(&self, day: NaiveDate) -> bool {
        self.valid_from.map_or(true, |from| from <= day)
            && self.valid_until.map_or(true, |until| day <= until)
    }
}

/// Records of one category as handed over by the data source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryInput {
    #[serde(default)]
    pub manifests: Vec<RawManifest>,
    /// `None` for categories without a revision workflow.
    #[serde(default)]
    pub revisions: Option<Vec<RevisionRecord>>,
    /// Set by a source that could not read this category; the category
    /// fails alone.
    #[serde(skip)]
    pub load_error: Option<String>,
}

impl CategoryInput {
    pub fn unreadable(reason: impl Into<String>) -> CategoryInput {
        CategoryInput {
            load_error: Some(reason.into()),
            ..Default::default()
        }
    }
}

/// Everything one report run needs from the data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportInput {
    pub establishment: Establishment,
    #[serde(default)]
    pub authorizations: Vec<RegulatoryAuthorization>,
    #[serde(default)]
    pub categories: BTreeMap<WasteCategory, CategoryInput>,
}
