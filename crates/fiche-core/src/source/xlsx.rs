use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::PathBuf;

use calamine::{Data, Range, Reader, Xlsx};
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use super::ManifestSource;
use crate::error::FicheError;
use crate::model::{
    CategoryInput, Establishment, RegulatoryAuthorization, ReportInput, WasteCategory,
};

/// Suffix of the sheet holding a category's revision requests, e.g.
/// `BSDD_revisions`.
const REVISION_SHEET_SUFFIX: &str = "_revisions";

/// Boolean columns; every other cell is read as text.
const BOOL_COLUMNS: &[&str] = &["noTraceability"];

/// An export workbook with one sheet per category, named by the category
/// code, and a header row of column names.
///
/// The workbook carries no establishment data, so it is supplied alongside.
#[derive(Debug, Clone)]
pub struct XlsxWorkbookSource {
    path: PathBuf,
    establishment: Establishment,
    authorizations: Vec<RegulatoryAuthorization>,
}

impl XlsxWorkbookSource {
    pub fn new(
        path: impl Into<PathBuf>,
        establishment: Establishment,
        authorizations: Vec<RegulatoryAuthorization>,
    ) -> Self {
        Self {
            path: path.into(),
            establishment,
            authorizations,
        }
    }
}

impl ManifestSource for XlsxWorkbookSource {
    fn load(&self) -> Result<ReportInput, FicheError> {
        let bytes = std::fs::read(&self.path)?;
        let categories = parse_workbook(&bytes)?;
        Ok(ReportInput {
            establishment: self.establishment.clone(),
            authorizations: self.authorizations.clone(),
            categories,
        })
    }

    fn backend_name(&self) -> &str {
        "xlsx"
    }
}

/// Read every category sheet present in the workbook. Categories without a
/// sheet are left out. A sheet that cannot be read only marks its own
/// category unreadable; the workbook as a whole fails only when it cannot
/// be opened.
pub fn parse_workbook(bytes: &[u8]) -> Result<BTreeMap<WasteCategory, CategoryInput>, FicheError> {
    let cursor = Cursor::new(bytes);
    let mut workbook: Xlsx<_> = calamine::open_workbook_from_rs(cursor)
        .map_err(|e| FicheError::Workbook(format!("failed to open xlsx: {e}")))?;

    let sheet_names = workbook.sheet_names();
    let find_sheet = |name: &str| {
        sheet_names
            .iter()
            .find(|n| n.trim().eq_ignore_ascii_case(name))
            .cloned()
    };
    let mut categories = BTreeMap::new();

    for category in WasteCategory::ALL {
        let code = category.code();
        let Some(sheet) = find_sheet(code) else {
            continue;
        };
        let revision_sheet = find_sheet(&format!("{code}{REVISION_SHEET_SUFFIX}"));

        let mut read = |name: &str| {
            workbook
                .worksheet_range(name)
                .map(|range| sheet_rows(&range))
                .map_err(|e| format!("sheet '{name}': {e}"))
        };
        let rows = read(sheet.as_str()).and_then(|manifests| {
            let revisions = revision_sheet.as_deref().map(&mut read).transpose()?;
            Ok((manifests, revisions))
        });

        let input = match rows {
            Ok((manifests, revisions)) => {
                category_from_rows(&sheet, manifests, revision_sheet.as_deref(), revisions)
            }
            Err(reason) => CategoryInput::unreadable(reason),
        };
        match &input.load_error {
            Some(reason) => log::warn!("xlsx: {category} unreadable: {reason}"),
            None => log::debug!("xlsx: sheet '{sheet}' read as {category}"),
        }
        categories.insert(category, input);
    }

    Ok(categories)
}

/// Deserialize the rows of one category. A row that does not fit the
/// record shape makes the whole category unreadable.
fn category_from_rows(
    sheet: &str,
    manifests: Vec<Value>,
    revision_sheet: Option<&str>,
    revisions: Option<Vec<Value>>,
) -> CategoryInput {
    let manifests = match serde_json::from_value(Value::Array(manifests)) {
        Ok(manifests) => manifests,
        Err(e) => return CategoryInput::unreadable(format!("sheet '{sheet}': {e}")),
    };
    let revisions = match revisions.map(|rows| serde_json::from_value(Value::Array(rows))) {
        None => None,
        Some(Ok(revisions)) => Some(revisions),
        Some(Err(e)) => {
            let name = revision_sheet.unwrap_or(sheet);
            return CategoryInput::unreadable(format!("sheet '{name}': {e}"));
        }
    };
    CategoryInput {
        manifests,
        revisions,
        load_error: None,
    }
}

/// Turn a sheet into one JSON object per row, keyed by the header row.
/// Empty cells are left out so they read as missing values.
fn sheet_rows(range: &Range<Data>) -> Vec<Value> {
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Vec::new();
    };
    let columns: Vec<Option<String>> = header.iter().map(cell_as_string).collect();

    rows.filter_map(|row| {
        let mut object = Map::new();
        for (column, cell) in columns.iter().zip(row) {
            let Some(column) = column else { continue };
            let value = if BOOL_COLUMNS.contains(&column.as_str()) {
                cell_as_bool(cell).map(Value::Bool)
            } else {
                cell_as_string(cell).map(Value::String)
            };
            if let Some(value) = value {
                object.insert(column.clone(), value);
            }
        }
        (!object.is_empty()).then_some(Value::Object(object))
    })
    .collect()
}

fn cell_as_string(cell: &Data) -> Option<String> {
    match cell {
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Data::Float(f) => Some(f64_to_decimal(*f).normalize().to_string()),
        Data::Int(i) => Some(i.to_string()),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|naive| naive.format("%Y-%m-%dT%H:%M:%SZ").to_string()),
        Data::Error(_) | Data::Empty => None,
    }
}

fn cell_as_bool(cell: &Data) -> Option<bool> {
    match cell {
        Data::Bool(b) => Some(*b),
        Data::Int(i) => Some(*i != 0),
        Data::Float(f) => Some(*f != 0.0),
        Data::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "oui" => Some(true),
            "false" | "0" | "non" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Convert f64 to Decimal through its shortest display form, so 0.0035
/// does not become 0.00349999...
fn f64_to_decimal(f: f64) -> Decimal {
    let s = format!("{f}");
    s.parse::<Decimal>()
        .unwrap_or_else(|_| Decimal::try_from(f).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_f64_to_decimal_preserves_precision() {
        assert_eq!(f64_to_decimal(0.0035), dec!(0.0035));
        assert_eq!(f64_to_decimal(68.0), dec!(68));
        assert_eq!(f64_to_decimal(12.5), dec!(12.5));
    }

    #[test]
    fn test_numeric_siret_read_as_digits() {
        let cell = Data::Float(12345678900011.0);
        assert_eq!(cell_as_string(&cell).as_deref(), Some("12345678900011"));
    }

    #[test]
    fn test_blank_cells_are_missing() {
        assert_eq!(cell_as_string(&Data::String("   ".into())), None);
        assert_eq!(cell_as_string(&Data::Empty), None);
    }

    #[test]
    fn test_bool_cells() {
        assert_eq!(cell_as_bool(&Data::String("TRUE".into())), Some(true));
        assert_eq!(cell_as_bool(&Data::Int(0)), Some(false));
        assert_eq!(cell_as_bool(&Data::Empty), None);
    }

    #[test]
    fn test_rows_keyed_by_header() {
        let mut range = Range::new((0, 0), (2, 2));
        range.set_value((0, 0), Data::String("id".into()));
        range.set_value((0, 1), Data::String("quantityReceived".into()));
        range.set_value((0, 2), Data::String("noTraceability".into()));
        range.set_value((1, 0), Data::String("BSD-1".into()));
        range.set_value((1, 1), Data::Float(2.5));
        range.set_value((1, 2), Data::Bool(true));

        let rows = sheet_rows(&range);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "BSD-1");
        assert_eq!(rows[0]["quantityReceived"], "2.5");
        assert_eq!(rows[0]["noTraceability"], true);
    }

    fn row(pairs: &[(&str, &str)]) -> Value {
        Value::Object(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                .collect(),
        )
    }

    #[test]
    fn test_bad_row_makes_category_unreadable() {
        let rows = vec![
            row(&[("id", "BSD-1"), ("quantityReceived", "2.5")]),
            row(&[("id", "BSD-2"), ("quantityReceived", "deux tonnes")]),
        ];
        let input = category_from_rows("BSDD", rows, None, None);
        assert!(input.manifests.is_empty());
        let reason = input.load_error.unwrap();
        assert!(reason.contains("sheet 'BSDD'"), "{reason}");
    }

    #[test]
    fn test_bad_revision_row_names_its_sheet() {
        let rows = vec![row(&[("id", "BSD-1")])];
        let revisions = vec![row(&[("manifestId", "BSD-1")])];
        let input = category_from_rows("BSDD", rows, Some("BSDD_revisions"), Some(revisions));
        assert!(input.load_error.unwrap().contains("BSDD_revisions"));
    }

    #[test]
    fn test_clean_rows_load() {
        let rows = vec![row(&[("id", "BSD-1"), ("quantityReceived", "2.5")])];
        let input = category_from_rows("BSDA", rows, None, Some(vec![]));
        assert_eq!(input.load_error, None);
        assert_eq!(input.manifests.len(), 1);
        assert_eq!(input.revisions, Some(vec![]));
    }

    #[test]
    fn test_garbage_bytes_rejected() {
        let err = parse_workbook(b"not a workbook").unwrap_err();
        assert!(matches!(err, FicheError::Workbook(_)));
    }
}
