//! Workbook loading - spreadsheet files → sheets of cell text

use crate::error::{CompileError, CompileResult};
use calamine::{open_workbook_auto, Data, Range, Reader};
use indexmap::IndexMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File extensions picked up when scanning a directory
pub const WORKBOOK_EXTENSIONS: [&str; 5] = ["xls", "xlsx", "xlsm", "xlsb", "ods"];

/// A named grid of cell text
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    /// Workbook file the sheet was loaded from
    pub source: PathBuf,
    cells: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>, cells: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            cells,
        }
    }

    /// Convenience constructor from string slices
    pub fn from_rows(name: &str, source: &str, rows: &[&[&str]]) -> Self {
        let cells = rows
            .iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect();
        Self::new(name, source, cells)
    }

    pub fn row_count(&self) -> usize {
        self.cells.len()
    }

    pub fn col_count(&self) -> usize {
        self.cells.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Cell text, empty for cells outside the used range
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.cells
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Source file name for messages
    pub fn file_label(&self) -> String {
        self.source.display().to_string()
    }
}

/// One loaded spreadsheet file
#[derive(Debug, Clone)]
pub struct Workbook {
    pub path: PathBuf,
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    /// Load every worksheet of a file
    pub fn load<P: AsRef<Path>>(path: P) -> CompileResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut workbook = open_workbook_auto(&path).map_err(|e| {
            CompileError::Load(format!("Failed to open workbook {}: {}", path.display(), e))
        })?;

        let mut sheets = Vec::new();
        for name in workbook.sheet_names() {
            let range = workbook.worksheet_range(&name).map_err(|e| {
                CompileError::Load(format!(
                    "Failed to read sheet {} in {}: {}",
                    name,
                    path.display(),
                    e
                ))
            })?;
            sheets.push(Sheet::new(name, path.clone(), range_to_cells(&range)));
        }

        Ok(Self { path, sheets })
    }
}

/// Expand a calamine range to absolute coordinates starting at A1
fn range_to_cells(range: &Range<Data>) -> Vec<Vec<String>> {
    let Some((end_row, end_col)) = range.end() else {
        return Vec::new();
    };

    (0..=end_row)
        .map(|row| {
            (0..=end_col)
                .map(|col| {
                    range
                        .get_value((row, col))
                        .map(cell_text)
                        .unwrap_or_default()
                })
                .collect()
        })
        .collect()
}

/// Text form of a cell. Integral numbers drop their decimal part so that
/// `1` typed into a numeric cell reads the same as the string `"1"`.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                (*f as i64).to_string()
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        other => other.to_string(),
    }
}

/// All sheets of all loaded workbooks, indexed by sheet name
#[derive(Debug, Clone, Default)]
pub struct WorkbookSet {
    sheets: IndexMap<String, Sheet>,
}

impl WorkbookSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recursively load every workbook under `dir`, in sorted path order
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> CompileResult<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(CompileError::Load(format!(
                "Excel path {} is not a directory",
                dir.display()
            )));
        }

        let mut files = Vec::new();
        collect_workbook_files(dir, &mut files)?;
        files.sort();

        let mut set = Self::new();
        for file in files {
            let workbook = Workbook::load(&file)?;
            debug!(
                file = %workbook.path.display(),
                sheets = workbook.sheets.len(),
                "loaded workbook"
            );
            set.add(workbook)?;
        }
        Ok(set)
    }

    /// Add a workbook; a sheet name already loaded from another file is an error
    pub fn add(&mut self, workbook: Workbook) -> CompileResult<()> {
        for sheet in workbook.sheets {
            self.add_sheet(sheet)?;
        }
        Ok(())
    }

    pub fn add_sheet(&mut self, sheet: Sheet) -> CompileResult<()> {
        if let Some(existing) = self.sheets.get(&sheet.name) {
            return Err(CompileError::Load(format!(
                "file {} contains duplicate sheet name '{}', already loaded from {}",
                sheet.source.display(),
                sheet.name,
                existing.source.display()
            )));
        }
        self.sheets.insert(sheet.name.clone(), sheet);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Sheet> {
        self.sheets.get(name)
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    pub fn sheet_names(&self) -> impl Iterator<Item = &str> {
        self.sheets.keys().map(String::as_str)
    }

    /// File a sheet was loaded from
    pub fn sheet_file(&self, name: &str) -> Option<&Path> {
        self.sheets.get(name).map(|s| s.source.as_path())
    }

    /// Up to `limit` sheet names sharing the most characters with `query`.
    ///
    /// The generic suffix `表` ("table") is ignored so it does not match everything.
    pub fn similar_sheets(&self, query: &str, limit: usize) -> Vec<&str> {
        let mut scored: Vec<(&str, usize)> = self
            .sheet_names()
            .map(|name| {
                let score = query
                    .chars()
                    .filter(|&c| c != '表' && name.contains(c))
                    .count();
                (name, score)
            })
            .filter(|(_, score)| *score > 0)
            .collect();
        // stable sort keeps load order among equal scores
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        scored.into_iter().take(limit).map(|(name, _)| name).collect()
    }
}

fn collect_workbook_files(dir: &Path, out: &mut Vec<PathBuf>) -> CompileResult<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_workbook_files(&path, out)?;
        } else if is_workbook_file(&path) {
            out.push(path);
        }
    }
    Ok(())
}

fn is_workbook_file(path: &Path) -> bool {
    let lock_file = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("~$"));
    let known_ext = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| WORKBOOK_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
    known_ext && !lock_file
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(name: &str, source: &str) -> Sheet {
        Sheet::from_rows(name, source, &[&["label"]])
    }

    #[test]
    fn test_cell_text_numbers() {
        assert_eq!(cell_text(&Data::Float(3.0)), "3");
        assert_eq!(cell_text(&Data::Float(-2.0)), "-2");
        assert_eq!(cell_text(&Data::Float(1.25)), "1.25");
        assert_eq!(cell_text(&Data::Int(7)), "7");
        assert_eq!(cell_text(&Data::Bool(true)), "TRUE");
        assert_eq!(cell_text(&Data::Empty), "");
        assert_eq!(cell_text(&Data::String("abc".to_string())), "abc");
    }

    #[test]
    fn test_sheet_cell_out_of_range_is_empty() {
        let s = Sheet::from_rows("S", "a.xlsx", &[&["a", "b"], &["c"]]);
        assert_eq!(s.cell(0, 1), "b");
        assert_eq!(s.cell(1, 1), "");
        assert_eq!(s.cell(9, 9), "");
        assert_eq!(s.row_count(), 2);
        assert_eq!(s.col_count(), 2);
    }

    #[test]
    fn test_duplicate_sheet_names_rejected() {
        let mut set = WorkbookSet::new();
        set.add_sheet(sheet("Items", "a.xlsx")).unwrap();
        let err = set.add_sheet(sheet("Items", "b.xlsx")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("a.xlsx"));
        assert!(msg.contains("b.xlsx"));
        assert!(msg.contains("Items"));
    }

    #[test]
    fn test_sheet_file_lookup() {
        let mut set = WorkbookSet::new();
        assert!(set.is_empty());
        set.add_sheet(sheet("Items", "dir/items.xlsx")).unwrap();
        assert!(!set.is_empty());
        assert_eq!(set.sheet_file("Items"), Some(Path::new("dir/items.xlsx")));
        assert_eq!(set.sheet_file("Nope"), None);
    }

    #[test]
    fn test_similar_sheets() {
        let mut set = WorkbookSet::new();
        set.add_sheet(sheet("物品表", "a.xlsx")).unwrap();
        set.add_sheet(sheet("消息提示表", "a.xlsx")).unwrap();
        set.add_sheet(sheet("技能表", "b.xlsx")).unwrap();

        assert_eq!(set.similar_sheets("物品", 5), vec!["物品表"]);
        assert_eq!(set.similar_sheets("提示消息", 5), vec!["消息提示表"]);
        // only the ignored suffix matches
        assert!(set.similar_sheets("表", 5).is_empty());
    }

    #[test]
    fn test_is_workbook_file() {
        assert!(is_workbook_file(Path::new("a/b.xlsx")));
        assert!(is_workbook_file(Path::new("a/b.XLS")));
        assert!(!is_workbook_file(Path::new("a/~$b.xlsx")));
        assert!(!is_workbook_file(Path::new("a/b.csv")));
    }

    #[test]
    fn test_load_dir_missing() {
        assert!(WorkbookSet::load_dir("/definitely/not/here").is_err());
    }
}
