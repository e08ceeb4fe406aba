use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    /// "01".."95", "2A", "2B" or a 3-digit overseas code.
    pub code: String,
    pub name: String,
    pub region: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepartmentFile {
    pub version: String,
    pub departments: Vec<Department>,
}

/// How consumption of an authorization is computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// Attributable received minus attributable emitted quantity.
    #[default]
    Balance,
    /// Day-by-day running total of inbound minus outbound, read at the end
    /// of the period.
    RunningBalance,
    /// Attributable received quantity.
    CumulativeInbound,
    /// Attributable processed quantity per elapsed day.
    DailyAverage,
}

/// Regulatory codes a processing operation counts against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationMapping {
    pub operation: String,
    pub rubriques: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDef {
    pub rubrique: String,
    pub policy: ThresholdPolicy,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RubriqueFile {
    pub version: String,
    pub operations: Vec<OperationMapping>,
    #[serde(default)]
    pub policies: Vec<PolicyDef>,
}
