pub mod database;
pub mod schema;

use crate::error::FicheError;
use schema::{Department, DepartmentFile, RubriqueFile, ThresholdPolicy};
use std::collections::HashMap;

/// Static lookup tables shared read-only by every pipeline of a run.
#[derive(Debug, Clone)]
pub struct ReferenceTables {
    departments: HashMap<String, Department>,
    operations: HashMap<String, Vec<String>>,
    policies: HashMap<String, ThresholdPolicy>,
}

impl ReferenceTables {
    /// Build tables from the department and rubrique JSON documents.
    pub fn from_json(departments_json: &str, rubriques_json: &str) -> Result<Self, FicheError> {
        let departments: DepartmentFile = serde_json::from_str(departments_json)?;
        let rubriques: RubriqueFile = serde_json::from_str(rubriques_json)?;
        Self::new(departments, rubriques)
    }

    pub fn new(departments: DepartmentFile, rubriques: RubriqueFile) -> Result<Self, FicheError> {
        if departments.departments.is_empty() {
            return Err(FicheError::ReferenceInvalid(
                "department table must not be empty".into(),
            ));
        }

        let mut by_code = HashMap::with_capacity(departments.departments.len());
        for dep in departments.departments {
            if dep.code.is_empty() {
                return Err(FicheError::ReferenceInvalid(format!(
                    "department '{}' has an empty code",
                    dep.name
                )));
            }
            if let Some(previous) = by_code.insert(dep.code.clone(), dep) {
                return Err(FicheError::ReferenceInvalid(format!(
                    "duplicate department code '{}'",
                    previous.code
                )));
            }
        }

        let mut operations: HashMap<String, Vec<String>> = HashMap::new();
        for mapping in rubriques.operations {
            operations
                .entry(normalize_operation(&mapping.operation))
                .or_default()
                .extend(mapping.rubriques);
        }

        let policies = rubriques
            .policies
            .into_iter()
            .map(|p| (p.rubrique.trim().to_string(), p.policy))
            .collect();

        Ok(Self {
            departments: by_code,
            operations,
            policies,
        })
    }

    pub fn department(&self, code: &str) -> Option<&Department> {
        self.departments.get(code)
    }

    pub fn department_count(&self) -> usize {
        self.departments.len()
    }

    /// Every department, ordered by code.
    pub fn departments(&self) -> Vec<&Department> {
        let mut all: Vec<&Department> = self.departments.values().collect();
        all.sort_by(|a, b| a.code.cmp(&b.code));
        all
    }

    /// Operation code to rubriques mapping, ordered by operation code.
    pub fn operations(&self) -> Vec<(&str, &[String])> {
        let mut all: Vec<(&str, &[String])> = self
            .operations
            .iter()
            .map(|(op, rubriques)| (op.as_str(), rubriques.as_slice()))
            .collect();
        all.sort_by_key(|(op, _)| *op);
        all
    }

    /// Rubriques with a non-default policy, ordered by rubrique.
    pub fn policies(&self) -> Vec<(&str, ThresholdPolicy)> {
        let mut all: Vec<(&str, ThresholdPolicy)> = self
            .policies
            .iter()
            .map(|(rubrique, policy)| (rubrique.as_str(), *policy))
            .collect();
        all.sort_by_key(|(rubrique, _)| *rubrique);
        all
    }

    /// Regulatory codes a processing operation counts against.
    pub fn rubriques_for(&self, operation: &str) -> &[String] {
        self.operations
            .get(&normalize_operation(operation))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Policy for an authorization key such as "2760-1": exact match first,
    /// then the bare rubrique, then the default balance policy.
    pub fn policy_for(&self, key: &str) -> ThresholdPolicy {
        if let Some(policy) = self.policies.get(key) {
            return *policy;
        }
        key.split_once('-')
            .and_then(|(rubrique, _)| self.policies.get(rubrique))
            .copied()
            .unwrap_or_default()
    }
}

/// "R 13", "r13" and "R13" all designate the same operation.
pub fn normalize_operation(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}
