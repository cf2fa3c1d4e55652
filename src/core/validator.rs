//! Header and row validation for compiled sheets

use crate::core::dependency::{parse_dependencies, Dependency, RefKind};
use crate::core::value_codec;
use crate::error::{CompileError, CompileResult, Location};
use crate::excel::{Sheet, WorkbookSet};
use crate::schema::{
    cell_name, ExportTarget, TargetFlag, ValueType, ALL_VALUE_TYPES, COL_START, FLAG_YES,
    FLOAT_DECIMAL_MAX, FLOAT_DECIMAL_MIN, HEADER_ROWS, KEY_PATTERN, ROW_DEPENDS, ROW_KEY,
    ROW_NAME, ROW_PRIMARY, ROW_REQUIRED, ROW_TARGET, ROW_TYPE,
};
use crate::types::Value;
use crate::writer::value_text;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static KEY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(KEY_PATTERN).expect("KEY_PATTERN is a valid regex"));

/// One exported column, as declared by the header rows
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub col: usize,
    pub name: String,
    pub key: String,
    pub value_type: ValueType,
    pub primary: bool,
    pub required: bool,
    pub depends: Vec<Dependency>,
    pub target: TargetFlag,
}

/// Exported fields of a sheet, left to right
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetSchema {
    pub fields: Vec<FieldDef>,
}

impl SheetSchema {
    pub fn field(&self, key: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn is_primary(&self, key: &str) -> bool {
        self.field(key).is_some_and(|f| f.primary)
    }

    /// Whether a record entry should be written for `target`.
    ///
    /// Entries unknown to the header were added by a before-hook and are always written.
    pub fn exports(&self, key: &str, target: ExportTarget) -> bool {
        self.field(key).map_or(true, |f| f.target.includes(target))
    }

    pub fn has_primary_for(&self, target: ExportTarget) -> bool {
        self.fields
            .iter()
            .any(|f| f.primary && f.target.includes(target))
    }
}

/// Converted primary-key text → zero-based row that first used it
pub type SeenKeys = HashMap<String, usize>;

/// Validate the header rows and return the exported field definitions.
///
/// Columns are scanned left to right and the first violation is reported.
pub fn check_sheet_headers(sheet: &Sheet) -> CompileResult<SheetSchema> {
    let file = sheet.file_label();
    let at = |row: usize, col: usize| {
        Location::sheet(file.clone(), sheet.name.clone()).with_cell(cell_name(row, col))
    };

    if sheet.row_count() < HEADER_ROWS {
        return Err(CompileError::schema(
            Location::sheet(file.clone(), sheet.name.clone()),
            format!("sheet must have at least {} rows", HEADER_ROWS),
        ));
    }

    let mut schema = SheetSchema::default();
    for col in COL_START..sheet.col_count() {
        let target_text = sheet.cell(ROW_TARGET, col);
        let target = TargetFlag::parse(target_text).ok_or_else(|| {
            CompileError::schema(
                at(ROW_TARGET, col),
                format!(
                    "unknown export target '{}', expected one of {:?} or empty",
                    target_text,
                    TargetFlag::ACCEPTED
                ),
            )
        })?;
        if !target.is_exported() {
            continue;
        }

        let name = sheet.cell(ROW_NAME, col);
        if name.is_empty() {
            return Err(CompileError::schema(
                at(ROW_NAME, col),
                "exported field has no display name",
            ));
        }

        let key = sheet.cell(ROW_KEY, col);
        if !KEY_REGEX.is_match(key) {
            return Err(CompileError::schema(
                at(ROW_KEY, col),
                format!("invalid field key '{}' (field: {})", key, name),
            ));
        }
        if schema.field(key).is_some() {
            return Err(CompileError::schema(
                at(ROW_KEY, col),
                format!("duplicate field key '{}' (field: {})", key, name),
            ));
        }

        let type_text = sheet.cell(ROW_TYPE, col);
        let value_type = ValueType::parse_strict(type_text).ok_or_else(|| {
            CompileError::schema(
                at(ROW_TYPE, col),
                format!(
                    "unknown type '{}' (field: {}), expected one of {:?}; float digits must be in [{}, {}]",
                    type_text, name, ALL_VALUE_TYPES, FLOAT_DECIMAL_MIN, FLOAT_DECIMAL_MAX
                ),
            )
        })?;

        let primary = parse_flag(sheet, ROW_PRIMARY, col, name, &at)?;
        let required = parse_flag(sheet, ROW_REQUIRED, col, name, &at)?;

        let depends = parse_dependencies(sheet.cell(ROW_DEPENDS, col)).map_err(|e| {
            CompileError::dependency(at(ROW_DEPENDS, col), format!("{} (field: {})", e, name))
        })?;

        schema.fields.push(FieldDef {
            col,
            name: name.to_string(),
            key: key.to_string(),
            value_type,
            primary,
            required,
            depends,
            target,
        });
    }

    if !schema.fields.iter().any(|f| f.primary) {
        return Err(CompileError::schema(
            Location::sheet(file, sheet.name.clone()),
            "no primary key field declared",
        ));
    }

    Ok(schema)
}

fn parse_flag(
    sheet: &Sheet,
    row: usize,
    col: usize,
    name: &str,
    at: &impl Fn(usize, usize) -> Location,
) -> CompileResult<bool> {
    match sheet.cell(row, col) {
        "" => Ok(false),
        FLAG_YES => Ok(true),
        other => Err(CompileError::schema(
            at(row, col),
            format!("unknown flag '{}' (field: {}), only Y or empty allowed", other, name),
        )),
    }
}

/// Validate one data row: emptiness rules, value format, dependencies and
/// primary-key uniqueness against `seen`.
pub fn check_row(
    sheet: &Sheet,
    schema: &SheetSchema,
    row: usize,
    all_sheets: &WorkbookSet,
    seen: &mut SeenKeys,
) -> CompileResult<()> {
    let file = sheet.file_label();
    let at = |col: usize| Location::sheet(file.clone(), sheet.name.clone()).with_cell(cell_name(row, col));

    let mut key_parts = Vec::new();
    for field in &schema.fields {
        let text = sheet.cell(row, field.col);

        if field.primary {
            if !field.value_type.is_key_type() {
                return Err(CompileError::schema(
                    at(field.col),
                    format!(
                        "field {} has type {} which cannot be a primary key",
                        field.key, field.value_type
                    ),
                ));
            }
        }

        if text.is_empty() {
            if field.primary || field.required {
                return Err(CompileError::row(
                    at(field.col),
                    format!("field {} cannot be empty (primary or required)", field.name),
                ));
            }
            continue;
        }

        value_codec::validate(text, field.value_type).map_err(|e| {
            CompileError::row(at(field.col), format!("field {}: {}", field.name, e))
        })?;

        // keys compare after conversion: `01` and `1` are the same int key
        if field.primary {
            let value = value_codec::parse(text, field.value_type).map_err(|e| {
                CompileError::row(at(field.col), format!("field {}: {}", field.name, e))
            })?;
            key_parts.push(value_text(&value));
        }

        for dep in &field.depends {
            check_dependency(field, dep, text, all_sheets)
                .map_err(|message| CompileError::dependency(at(field.col), message))?;
        }
    }

    let key = key_parts.join("|");
    if let Some(first) = seen.get(&key) {
        return Err(CompileError::row(
            Location::sheet(file, sheet.name.clone()),
            format!(
                "row {} primary key ({}) duplicates row {}",
                row + 1,
                key_parts.join(", "),
                first + 1
            ),
        ));
    }
    seen.insert(key, row);
    Ok(())
}

fn check_dependency(
    field: &FieldDef,
    dep: &Dependency,
    text: &str,
    all_sheets: &WorkbookSet,
) -> Result<(), String> {
    let target = all_sheets.get(&dep.sheet).ok_or_else(|| {
        format!(
            "field {} depends on sheet '{}' which does not exist",
            field.name, dep.sheet
        )
    })?;

    match dep.kind {
        RefKind::Value => {
            if !value_exists(target, &dep.field, text)? {
                return Err(format!(
                    "field {} value '{}' not found in {}.{}",
                    field.name, text, dep.sheet, dep.field
                ));
            }
        }
        RefKind::Key => {
            if field.value_type != ValueType::Table {
                return Err(format!(
                    "field {}: _key_ref only applies to table fields",
                    field.name
                ));
            }
            let table = value_codec::parse_table(text);
            for member in table.members() {
                let found = match member.cell_text() {
                    Some(member_text) => value_exists(target, &dep.field, &member_text)?,
                    None => false,
                };
                if !found {
                    return Err(format!(
                        "field {} key {} not found in {}.{}",
                        field.name,
                        describe(member),
                        dep.sheet,
                        dep.field
                    ));
                }
            }
        }
    }
    Ok(())
}

/// Linear scan of `field`'s column in `sheet` for a cell equal to `text`
fn value_exists(sheet: &Sheet, field: &str, text: &str) -> Result<bool, String> {
    let col = (COL_START..sheet.col_count())
        .find(|&col| sheet.cell(ROW_KEY, col) == field)
        .ok_or_else(|| format!("field '{}' does not exist in sheet '{}'", field, sheet.name))?;

    Ok((HEADER_ROWS..sheet.row_count()).any(|row| sheet.cell(row, col) == text))
}

fn describe(value: &Value) -> String {
    value.cell_text().unwrap_or_else(|| "<table>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LABELS: [&str; 8] = ["", "name", "key", "type", "primary", "required", "depends", "target"];

    /// Build a sheet from header columns (one &str per header row) and data rows
    fn build(name: &str, columns: &[[&str; 8]], data: &[&[&str]]) -> Sheet {
        let mut rows: Vec<Vec<String>> = (0..HEADER_ROWS)
            .map(|r| {
                let mut row = vec![LABELS[r].to_string()];
                row.extend(columns.iter().map(|c| c[r].to_string()));
                row
            })
            .collect();
        for d in data {
            let mut row = vec![String::new()];
            row.extend(d.iter().map(|c| c.to_string()));
            rows.push(row);
        }
        Sheet::new(name, format!("{}.xlsx", name), rows)
    }

    fn id_col() -> [&'static str; 8] {
        ["", "ID", "id", "int", "Y", "", "", "cs"]
    }

    fn name_col() -> [&'static str; 8] {
        ["", "Name", "name", "string", "", "", "", "cs"]
    }

    fn check_all(sheet: &Sheet, all: &WorkbookSet) -> CompileResult<()> {
        let schema = check_sheet_headers(sheet)?;
        let mut seen = SeenKeys::new();
        for row in HEADER_ROWS..sheet.row_count() {
            check_row(sheet, &schema, row, all, &mut seen)?;
        }
        Ok(())
    }

    #[test]
    fn test_valid_headers() {
        let sheet = build("Items", &[id_col(), name_col()], &[]);
        let schema = check_sheet_headers(&sheet).unwrap();
        assert_eq!(schema.fields.len(), 2);
        assert!(schema.is_primary("id"));
        assert!(!schema.is_primary("name"));
        assert_eq!(schema.fields[0].col, 1);
    }

    #[test]
    fn test_too_few_rows() {
        let sheet = Sheet::from_rows("Short", "s.xlsx", &[&["a"], &["b"]]);
        let err = check_sheet_headers(&sheet).unwrap_err();
        assert!(err.to_string().contains("at least 8 rows"));
    }

    #[test]
    fn test_missing_primary_key() {
        let mut id = id_col();
        id[4] = "";
        let sheet = build("Items", &[id, name_col()], &[]);
        let err = check_sheet_headers(&sheet).unwrap_err();
        assert!(matches!(err, CompileError::Schema { .. }));
        assert!(err.to_string().contains("no primary key"));
    }

    #[test]
    fn test_unexported_columns_are_ignored() {
        let junk = ["", "", "not a key!", "???", "maybe", "", "", ""];
        let sheet = build("Items", &[id_col(), junk], &[]);
        assert_eq!(check_sheet_headers(&sheet).unwrap().fields.len(), 1);
    }

    #[test]
    fn test_bad_target() {
        let mut name = name_col();
        name[7] = "x";
        let err = check_sheet_headers(&build("Items", &[id_col(), name], &[])).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("C8"), "{msg}");
        assert!(msg.contains("'x'"));
    }

    #[test]
    fn test_bad_key_pattern() {
        let mut name = name_col();
        name[2] = "1name";
        let err = check_sheet_headers(&build("Items", &[id_col(), name], &[])).unwrap_err();
        assert!(err.to_string().contains("invalid field key '1name'"));
    }

    #[test]
    fn test_duplicate_key() {
        let mut name = name_col();
        name[2] = "id";
        let err = check_sheet_headers(&build("Items", &[id_col(), name], &[])).unwrap_err();
        assert!(err.to_string().contains("duplicate field key 'id'"));
    }

    #[test]
    fn test_missing_display_name() {
        let mut name = name_col();
        name[1] = "";
        let err = check_sheet_headers(&build("Items", &[id_col(), name], &[])).unwrap_err();
        assert!(err.to_string().contains("no display name"));
    }

    #[test]
    fn test_bad_type() {
        let mut name = name_col();
        name[3] = "text";
        assert!(check_sheet_headers(&build("Items", &[id_col(), name], &[])).is_err());

        name[3] = "float,6";
        assert!(check_sheet_headers(&build("Items", &[id_col(), name], &[])).is_err());

        name[3] = "float,4";
        assert!(check_sheet_headers(&build("Items", &[id_col(), name], &[])).is_ok());
    }

    #[test]
    fn test_bad_flags() {
        let mut name = name_col();
        name[5] = "yes";
        let err = check_sheet_headers(&build("Items", &[id_col(), name], &[])).unwrap_err();
        assert!(err.to_string().contains("only Y or empty"));
    }

    #[test]
    fn test_malformed_dependency_in_header() {
        let mut name = name_col();
        name[6] = "eval('boom')";
        let err = check_sheet_headers(&build("Items", &[id_col(), name], &[])).unwrap_err();
        assert!(matches!(err, CompileError::Dependency { .. }));
    }

    #[test]
    fn test_rows_pass() {
        let sheet = build("Items", &[id_col(), name_col()], &[&["1", "a"], &["2", ""]]);
        assert!(check_all(&sheet, &WorkbookSet::new()).is_ok());
    }

    #[test]
    fn test_empty_primary_cell() {
        let sheet = build("Items", &[id_col(), name_col()], &[&["", "a"]]);
        let err = check_all(&sheet, &WorkbookSet::new()).unwrap_err();
        assert!(matches!(err, CompileError::Row { .. }));
        assert!(err.to_string().contains("B9"));
    }

    #[test]
    fn test_empty_required_cell() {
        let mut name = name_col();
        name[5] = "Y";
        let sheet = build("Items", &[id_col(), name], &[&["1", ""]]);
        assert!(check_all(&sheet, &WorkbookSet::new()).is_err());
    }

    #[test]
    fn test_malformed_value() {
        let sheet = build("Items", &[id_col(), name_col()], &[&["abc", "a"]]);
        let err = check_all(&sheet, &WorkbookSet::new()).unwrap_err();
        assert!(err.to_string().contains("not a valid int"));
    }

    #[test]
    fn test_table_primary_key_rejected() {
        let mut id = id_col();
        id[3] = "table";
        let sheet = build("Items", &[id], &[&["a:1"]]);
        assert!(check_all(&sheet, &WorkbookSet::new()).is_err());
    }

    #[test]
    fn test_duplicate_primary_key_names_both_rows() {
        let sheet = build(
            "Items",
            &[id_col(), name_col()],
            &[&["1", "a"], &["2", "b"], &["1", "c"]],
        );
        let err = check_all(&sheet, &WorkbookSet::new()).unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, CompileError::Row { .. }));
        assert!(msg.contains("row 11"), "{msg}");
        assert!(msg.contains("row 9"), "{msg}");
    }

    #[test]
    fn test_primary_key_compared_after_conversion() {
        let float_key = ["", "Rate", "rate", "float,2", "Y", "", "", "cs"];
        let sheet = build("Rates", &[float_key, name_col()], &[&["1.231", "first"], &["1.234", "second"]]);
        let err = check_all(&sheet, &WorkbookSet::new()).unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, CompileError::Row { .. }));
        assert!(msg.contains("row 10"), "{msg}");
        assert!(msg.contains("row 9"), "{msg}");
        assert!(msg.contains("1.23"), "{msg}");

        let sheet = build("Items", &[id_col(), name_col()], &[&["1", "a"], &["01", "b"]]);
        assert!(matches!(
            check_all(&sheet, &WorkbookSet::new()),
            Err(CompileError::Row { .. })
        ));

        let bool_key = ["", "Flag", "flag", "bool", "Y", "", "", "cs"];
        let sheet = build("Flags", &[bool_key], &[&["T"], &["TRUE"]]);
        assert!(check_all(&sheet, &WorkbookSet::new()).is_err());

        let sheet = build("Rates", &[float_key, name_col()], &[&["1.23", "a"], &["1.24", "b"]]);
        assert!(check_all(&sheet, &WorkbookSet::new()).is_ok());
    }

    #[test]
    fn test_composite_primary_key() {
        let mut name = name_col();
        name[4] = "Y";
        let sheet = build(
            "Items",
            &[id_col(), name],
            &[&["1", "a"], &["1", "b"], &["2", "a"]],
        );
        assert!(check_all(&sheet, &WorkbookSet::new()).is_ok());

        let dup = build("Items", &[id_col(), name], &[&["1", "a"], &["1", "a"]]);
        assert!(check_all(&dup, &WorkbookSet::new()).is_err());
    }

    fn item_set() -> WorkbookSet {
        let mut set = WorkbookSet::new();
        set.add_sheet(build(
            "Items",
            &[id_col(), name_col()],
            &[&["100", "sword"], &["200", "shield"]],
        ))
        .unwrap();
        set
    }

    fn ref_col(ty: &'static str, dep: &'static str) -> [&'static str; 8] {
        ["", "Ref", "item", ty, "", "", dep, "cs"]
    }

    #[test]
    fn test_value_ref() {
        let all = item_set();
        let col = ref_col("int", r#"_ref("Items", "id")"#);

        let ok = build("Drops", &[id_col(), col], &[&["1", "200"], &["2", ""]]);
        assert!(check_all(&ok, &all).is_ok());

        let bad = build("Drops", &[id_col(), col], &[&["1", "300"]]);
        let err = check_all(&bad, &all).unwrap_err();
        assert!(matches!(err, CompileError::Dependency { .. }));
        assert!(err.to_string().contains("'300' not found in Items.id"));
    }

    #[test]
    fn test_value_ref_missing_sheet_or_field() {
        let all = item_set();
        let sheet = build(
            "Drops",
            &[id_col(), ref_col("int", r#"_ref("Monsters", "id")"#)],
            &[&["1", "100"]],
        );
        assert!(check_all(&sheet, &all)
            .unwrap_err()
            .to_string()
            .contains("'Monsters' which does not exist"));

        let sheet = build(
            "Drops",
            &[id_col(), ref_col("int", r#"_ref("Items", "uid")"#)],
            &[&["1", "100"]],
        );
        assert!(check_all(&sheet, &all)
            .unwrap_err()
            .to_string()
            .contains("'uid' does not exist"));
    }

    #[test]
    fn test_key_ref_map_and_list() {
        let all = item_set();
        let col = ref_col("table", r#"_key_ref("Items", "id")"#);

        let ok = build("Drops", &[id_col(), col], &[&["1", "100:5;200:1"], &["2", "100,200"]]);
        assert!(check_all(&ok, &all).is_ok());

        let bad = build("Drops", &[id_col(), col], &[&["1", "100:5;999:1"]]);
        let err = check_all(&bad, &all).unwrap_err();
        assert!(err.to_string().contains("key 999"));
    }

    #[test]
    fn test_key_ref_requires_table() {
        let all = item_set();
        let col = ref_col("int", r#"_key_ref("Items", "id")"#);
        let sheet = build("Drops", &[id_col(), col], &[&["1", "100"]]);
        let err = check_all(&sheet, &all).unwrap_err();
        assert!(err.to_string().contains("only applies to table"));
    }

    #[test]
    fn test_multiple_dependencies_checked_independently() {
        let mut all = item_set();
        all.add_sheet(build("Shop", &[id_col()], &[&["100"]])).unwrap();
        let col = ref_col("int", r#"_ref("Items", "id");_ref("Shop", "id")"#);

        let ok = build("Drops", &[id_col(), col], &[&["1", "100"]]);
        assert!(check_all(&ok, &all).is_ok());

        let bad = build("Drops", &[id_col(), col], &[&["1", "200"]]);
        assert!(check_all(&bad, &all)
            .unwrap_err()
            .to_string()
            .contains("Shop.id"));
    }

    #[test]
    fn test_schema_exports() {
        let mut name = name_col();
        name[7] = "s";
        let sheet = build("Items", &[id_col(), name], &[]);
        let schema = check_sheet_headers(&sheet).unwrap();
        assert!(schema.exports("name", ExportTarget::Server));
        assert!(!schema.exports("name", ExportTarget::Client));
        assert!(schema.exports("added_by_hook", ExportTarget::Client));
        assert!(schema.has_primary_for(ExportTarget::Client));
    }
}
