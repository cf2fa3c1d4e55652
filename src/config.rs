//! Export map: which sheets are compiled, for which side, into which file
//!
//! ```yaml
//! 消息提示表:
//!   c: message
//!   s: message
//! 物品表:
//!   s: item
//! ```

use crate::error::{CompileError, CompileResult};
use crate::schema::ExportTarget;
use indexmap::IndexMap;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// File shape before target codes are checked
#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct RawExportConfig {
    sheets: IndexMap<String, IndexMap<String, String>>,
}

/// Sheet name → per-target output base names, in export order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExportConfig {
    sheets: IndexMap<String, IndexMap<ExportTarget, String>>,
}

impl ExportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// The project's export map, paired with the builtin project hooks
    pub fn builtin() -> Self {
        let mut config = Self::new();
        config
            .add("消息提示表", ExportTarget::Client, "message")
            .add("消息提示表", ExportTarget::Server, "message")
            .add("物品表", ExportTarget::Client, "item")
            .add("物品表", ExportTarget::Server, "item");
        config
    }

    pub fn add(&mut self, sheet: &str, target: ExportTarget, file: &str) -> &mut Self {
        self.sheets
            .entry(sheet.to_string())
            .or_default()
            .insert(target, file.to_string());
        self
    }

    pub fn from_yaml_str(text: &str) -> CompileResult<Self> {
        let raw: RawExportConfig = serde_yaml::from_str(text)?;

        let mut config = Self::new();
        for (sheet, targets) in raw.sheets {
            for (code, file) in targets {
                let target = ExportTarget::from_code(&code).ok_or_else(|| {
                    CompileError::Config(format!(
                        "sheet {}: unknown export target '{}', expected c or s",
                        sheet, code
                    ))
                })?;
                if file.trim().is_empty() {
                    return Err(CompileError::Config(format!(
                        "sheet {}: empty output file name for target {}",
                        sheet, code
                    )));
                }
                config.add(&sheet, target, &file);
            }
        }
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> CompileResult<Self> {
        let text = fs::read_to_string(path.as_ref()).map_err(|e| {
            CompileError::Config(format!(
                "cannot read export config {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndexMap<ExportTarget, String>)> {
        self.sheets.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}
