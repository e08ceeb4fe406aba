use crate::model::{Establishment, Manifest, RevisionRecord};
use crate::period::YearMonth;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Who filed a revision request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authorship {
    /// The establishment that emitted the manifest.
    Emitter,
    Other,
}

impl Authorship {
    pub fn classify(revision: &RevisionRecord, establishment: &Establishment) -> Authorship {
        match revision.authoring_company_id.as_deref() {
            Some(company) if establishment.is_same_company(company) => Authorship::Emitter,
            _ => Authorship::Other,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevisionSummary {
    /// Revision events by month of the request and authorship.
    pub by_month: BTreeMap<YearMonth, BTreeMap<Authorship, u64>>,
    /// Revision events joined to a manifest the establishment emitted.
    pub events: u64,
    /// Distinct manifests with at least one such revision.
    pub revised_manifests: u64,
    /// Revisions whose parent manifest is not in the clean set.
    pub unattributed: u64,
}

impl RevisionSummary {
    /// Events per month, all authors together.
    pub fn per_month(&self) -> BTreeMap<YearMonth, u64> {
        self.by_month
            .iter()
            .map(|(month, by_author)| (*month, by_author.values().sum()))
            .collect()
    }
}

/// Join revision requests to the establishment's emitted manifests.
///
/// Revisions of manifests the establishment did not emit are left out.
pub fn reconcile(
    revisions: &[RevisionRecord],
    manifests: &[Manifest],
    establishment: &Establishment,
) -> RevisionSummary {
    let parents: HashMap<&str, &Manifest> =
        manifests.iter().map(|m| (m.id.as_str(), m)).collect();

    let mut summary = RevisionSummary::default();
    let mut revised: HashSet<&str> = HashSet::new();

    for revision in revisions {
        let Some(parent) = parents.get(revision.manifest_id.as_str()) else {
            summary.unattributed += 1;
            continue;
        };
        if !parent.is_emitted_by(&establishment.siret) {
            continue;
        }

        let authorship = Authorship::classify(revision, establishment);
        *summary
            .by_month
            .entry(YearMonth::of(&revision.created_at))
            .or_default()
            .entry(authorship)
            .or_default() += 1;
        summary.events += 1;
        revised.insert(parent.id.as_str());
    }

    summary.revised_manifests = revised.len() as u64;
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DateField, RawManifest};
    use crate::pipeline::quarantine::quarantine_dates;

    const SITE: &str = "12345678900011";

    fn establishment() -> Establishment {
        serde_json::from_str(&format!(
            r#"{{ "siret": "{SITE}", "companyId": "ck-site" }}"#
        ))
        .unwrap()
    }

    fn manifests() -> Vec<Manifest> {
        let raw: Vec<RawManifest> = serde_json::from_str(&format!(
            r#"[
                {{ "id": "M1", "emitterCompanySiret": "{SITE}", "createdAt": "2024-01-02" }},
                {{ "id": "M2", "emitterCompanySiret": "{SITE}", "createdAt": "2024-01-03" }},
                {{ "id": "M3", "emitterCompanySiret": "55555555555555", "createdAt": "2024-01-03" }}
            ]"#
        ))
        .unwrap();
        quarantine_dates(raw, &DateField::ALL).0
    }

    fn revision(id: &str, parent: &str, author: Option<&str>, at: &str) -> RevisionRecord {
        RevisionRecord {
            id: id.into(),
            manifest_id: parent.into(),
            authoring_company_id: author.map(String::from),
            created_at: at.parse().unwrap(),
        }
    }

    #[test]
    fn test_events_versus_distinct_manifests() {
        let revisions = vec![
            revision("R1", "M1", Some("ck-site"), "2024-02-01T10:00:00Z"),
            revision("R2", "M1", Some("ck-other"), "2024-02-15T10:00:00Z"),
            revision("R3", "M2", Some(SITE), "2024-03-01T10:00:00Z"),
        ];
        let summary = reconcile(&revisions, &manifests(), &establishment());
        assert_eq!(summary.events, 3);
        assert_eq!(summary.revised_manifests, 2);
    }

    #[test]
    fn test_authorship_by_siret_or_company_id() {
        let revisions = vec![
            revision("R1", "M1", Some("ck-site"), "2024-02-01T10:00:00Z"),
            revision("R2", "M1", Some("ck-other"), "2024-02-15T10:00:00Z"),
            revision("R3", "M2", Some(SITE), "2024-02-20T10:00:00Z"),
            revision("R4", "M2", None, "2024-02-21T10:00:00Z"),
        ];
        let summary = reconcile(&revisions, &manifests(), &establishment());
        let feb = &summary.by_month[&YearMonth::new(2024, 2).unwrap()];
        assert_eq!(feb[&Authorship::Emitter], 2);
        assert_eq!(feb[&Authorship::Other], 2);
    }

    #[test]
    fn test_orphan_revision_unattributed() {
        let revisions = vec![revision("R1", "GONE", Some("ck-site"), "2024-02-01T10:00:00Z")];
        let summary = reconcile(&revisions, &manifests(), &establishment());
        assert_eq!(summary.unattributed, 1);
        assert_eq!(summary.events, 0);
        assert!(summary.by_month.is_empty());
    }

    #[test]
    fn test_foreign_manifest_revision_skipped() {
        let revisions = vec![revision("R1", "M3", Some("ck-site"), "2024-02-01T10:00:00Z")];
        let summary = reconcile(&revisions, &manifests(), &establishment());
        assert_eq!(summary.events, 0);
        assert_eq!(summary.unattributed, 0);
    }

    #[test]
    fn test_per_month_totals() {
        let revisions = vec![
            revision("R1", "M1", Some("ck-site"), "2024-02-01T10:00:00Z"),
            revision("R2", "M2", None, "2024-02-03T10:00:00Z"),
        ];
        let summary = reconcile(&revisions, &manifests(), &establishment());
        assert_eq!(summary.per_month()[&YearMonth::new(2024, 2).unwrap()], 2);
    }
}
