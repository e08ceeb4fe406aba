use super::ReferenceTables;
use std::sync::LazyLock;

const DEPARTMENTS_JSON: &str = include_str!("../../../../reference/departements.json");
const RUBRIQUES_JSON: &str = include_str!("../../../../reference/rubriques.json");

static BUILTIN_TABLES: LazyLock<ReferenceTables> = LazyLock::new(|| {
    ReferenceTables::from_json(DEPARTMENTS_JSON, RUBRIQUES_JSON)
        .expect("embedded reference tables are valid")
});

/// Reference tables shipped with the crate, parsed on first use.
pub fn builtin_tables() -> &'static ReferenceTables {
    &BUILTIN_TABLES
}
