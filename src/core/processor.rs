//! The three per-sheet passes: build records, write them, run after-hooks

use crate::core::validator::{check_row, check_sheet_headers, SeenKeys, SheetSchema};
use crate::core::value_codec;
use crate::error::{CompileError, CompileResult, Location};
use crate::excel::{Sheet, WorkbookSet};
use crate::hooks::{AfterContext, BeforeContext, HookRegistry};
use crate::schema::{cell_name, ExportTarget, Phase, HEADER_ROWS};
use crate::types::RowRecord;
use crate::writer::{Entry, LuaWriter, TextMode, WriteMode};
use indexmap::IndexMap;
use std::path::Path;
use tracing::info;

/// Validates a sheet and turns its data rows into records for one target
pub struct BeforeProcessor<'a> {
    sheet: &'a Sheet,
    all_sheets: &'a WorkbookSet,
    hooks: &'a HookRegistry,
}

impl<'a> BeforeProcessor<'a> {
    pub fn new(sheet: &'a Sheet, all_sheets: &'a WorkbookSet, hooks: &'a HookRegistry) -> Self {
        Self {
            sheet,
            all_sheets,
            hooks,
        }
    }

    /// Build the records, then run the target's before-hooks bound to this sheet
    pub fn process(&self, target: ExportTarget) -> CompileResult<(SheetSchema, Vec<RowRecord>)> {
        let schema = check_sheet_headers(self.sheet)?;
        let mut seen = SeenKeys::new();

        let mut rows = Vec::with_capacity(self.sheet.row_count().saturating_sub(HEADER_ROWS));
        for row in HEADER_ROWS..self.sheet.row_count() {
            check_row(self.sheet, &schema, row, self.all_sheets, &mut seen)?;
            rows.push(self.build_record(&schema, row)?);
        }

        for hook in self.hooks.before_hooks_for(target, &self.sheet.name) {
            info!(
                hook = %hook.name,
                sheet = %self.sheet.name,
                phase = ?Phase::before(target),
                "running hook"
            );
            let mut ctx = BeforeContext {
                sheet: &self.sheet.name,
                target,
                rows: &mut rows,
            };
            (hook.run)(&mut ctx).map_err(|e| {
                CompileError::Hook(format!(
                    "before-hook {} failed on file: {} sheet: {}: {:#}",
                    hook.name,
                    self.sheet.file_label(),
                    self.sheet.name,
                    e
                ))
            })?;
        }

        Ok((schema, rows))
    }

    fn build_record(&self, schema: &SheetSchema, row: usize) -> CompileResult<RowRecord> {
        let mut record = RowRecord::with_capacity(schema.fields.len());
        for field in &schema.fields {
            let text = self.sheet.cell(row, field.col);
            let value = if text.is_empty() {
                value_codec::default_value(field.value_type)
            } else {
                value_codec::parse(text, field.value_type).map_err(|e| {
                    CompileError::row(
                        Location::sheet(self.sheet.file_label(), self.sheet.name.clone())
                            .with_cell(cell_name(row, field.col)),
                        e.to_string(),
                    )
                })?
            };
            record.insert(field.key.clone(), value);
        }
        Ok(record)
    }
}

/// Writes one sheet's records for one target
pub struct ExportProcessor<'a> {
    sheet: &'a Sheet,
    schema: &'a SheetSchema,
    rows: &'a [RowRecord],
    target: ExportTarget,
}

impl<'a> ExportProcessor<'a> {
    pub fn new(sheet: &'a Sheet, schema: &'a SheetSchema, rows: &'a [RowRecord], target: ExportTarget) -> Self {
        Self {
            sheet,
            schema,
            rows,
            target,
        }
    }

    /// Feed every record into `writer` and dump it
    pub fn process(&self, writer: &mut LuaWriter) -> CompileResult<()> {
        if !self.schema.has_primary_for(self.target) {
            return Err(CompileError::schema(
                Location::sheet(self.sheet.file_label(), self.sheet.name.clone()),
                format!("no primary key field is exported to the {}", self.target),
            ));
        }

        for record in self.rows {
            let mut keys = Vec::new();
            let mut values = Vec::with_capacity(record.len());
            for (name, value) in record {
                if !self.schema.exports(name, self.target) {
                    continue;
                }
                let entry = Entry::new(name.clone(), value.clone());
                if self.schema.is_primary(name) {
                    keys.push(entry.clone());
                }
                values.push(entry);
            }
            writer.write(&keys, &values, WriteMode::Dict, TextMode::WithinBraces)?;
        }
        writer.dump_to_file()?;
        Ok(())
    }
}

/// Runs a target's after-hooks over the processed sheets
pub struct AfterProcessor<'a> {
    data: &'a IndexMap<String, Vec<RowRecord>>,
    target: ExportTarget,
    output_dir: &'a Path,
}

impl<'a> AfterProcessor<'a> {
    pub fn new(data: &'a IndexMap<String, Vec<RowRecord>>, target: ExportTarget, output_dir: &'a Path) -> Self {
        Self {
            data,
            target,
            output_dir,
        }
    }

    pub fn process(&self, hooks: &HookRegistry) -> CompileResult<()> {
        for hook in hooks.after_hooks(self.target) {
            let mut sheets = IndexMap::new();
            for name in &hook.sheets {
                let rows = self.data.get(name).ok_or_else(|| {
                    CompileError::Hook(format!(
                        "after-hook {} references sheet {} which was not processed for the {}",
                        hook.name, name, self.target
                    ))
                })?;
                sheets.insert(name.as_str(), rows.as_slice());
            }

            info!(hook = %hook.name, phase = ?Phase::after(self.target), "running hook");
            let ctx = AfterContext {
                target: self.target,
                sheets,
                output_dir: self.output_dir,
            };
            (hook.run)(&ctx).map_err(|e| {
                CompileError::Hook(format!("after-hook {} failed: {:#}", hook.name, e))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;
    use tempfile::TempDir;

    fn items() -> Sheet {
        Sheet::from_rows(
            "Items",
            "items.xlsx",
            &[
                &["", "", "", ""],
                &["", "ID", "Name", "Price"],
                &["", "id", "name", "price"],
                &["", "int", "string", "float,1"],
                &["", "Y", "", ""],
                &["", "", "", ""],
                &["", "", "", ""],
                &["", "cs", "c", "s"],
                &["", "1", "sword", "9.96"],
                &["", "2", "", ""],
            ],
        )
    }

    #[test]
    fn test_build_records_with_defaults() {
        let sheet = items();
        let set = WorkbookSet::new();
        let hooks = HookRegistry::new();
        let (_, rows) = BeforeProcessor::new(&sheet, &set, &hooks)
            .process(ExportTarget::Client)
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], Value::Int(1));
        assert_eq!(rows[0]["name"], Value::from("sword"));
        assert_eq!(rows[0]["price"], Value::Float(10.0));
        assert_eq!(rows[1]["name"], Value::from(""));
        assert_eq!(rows[1]["price"], Value::Float(0.0));
    }

    #[test]
    fn test_before_hooks_run_in_order_for_matching_target() {
        let sheet = items();
        let set = WorkbookSet::new();
        let mut hooks = HookRegistry::new();
        hooks
            .register_before(Phase::ClientBefore, "tag", &["Items"], |ctx| {
                for row in ctx.rows.iter_mut() {
                    row.insert("tag".to_string(), Value::from("a"));
                }
                Ok(())
            })
            .unwrap()
            .register_before(Phase::ClientBefore, "retag", &["Items"], |ctx| {
                for row in ctx.rows.iter_mut() {
                    row.insert("tag".to_string(), Value::from("b"));
                }
                Ok(())
            })
            .unwrap()
            .register_before(Phase::ClientBefore, "other", &["Other"], |_| {
                anyhow::bail!("must not run")
            })
            .unwrap();

        let processor = BeforeProcessor::new(&sheet, &set, &hooks);
        let (_, client) = processor.process(ExportTarget::Client).unwrap();
        assert_eq!(client[0]["tag"], Value::from("b"));

        let (_, server) = processor.process(ExportTarget::Server).unwrap();
        assert!(!server[0].contains_key("tag"));
    }

    #[test]
    fn test_before_hook_failure_names_hook() {
        let sheet = items();
        let set = WorkbookSet::new();
        let mut hooks = HookRegistry::new();
        hooks
            .register_before(Phase::ServerBefore, "explode", &["Items"], |_| {
                anyhow::bail!("boom")
            })
            .unwrap();

        let err = BeforeProcessor::new(&sheet, &set, &hooks)
            .process(ExportTarget::Server)
            .unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, CompileError::Hook(_)));
        assert!(msg.contains("explode"));
        assert!(msg.contains("boom"));
        assert!(msg.contains("Items"));
    }

    #[test]
    fn test_export_filters_fields_by_target() {
        let dir = TempDir::new().unwrap();
        let sheet = items();
        let set = WorkbookSet::new();
        let hooks = HookRegistry::new();
        let processor = BeforeProcessor::new(&sheet, &set, &hooks);

        let (schema, rows) = processor.process(ExportTarget::Client).unwrap();
        let mut writer = LuaWriter::new(dir.path(), "items").unwrap();
        ExportProcessor::new(&sheet, &schema, &rows, ExportTarget::Client)
            .process(&mut writer)
            .unwrap();
        let client = std::fs::read_to_string(dir.path().join("items.lua")).unwrap();
        assert!(client.contains("[1] = {id = 1, name = \"sword\"}"));
        assert!(!client.contains("price"));

        let (schema, rows) = processor.process(ExportTarget::Server).unwrap();
        let mut writer = LuaWriter::new(dir.path(), "items_server").unwrap();
        ExportProcessor::new(&sheet, &schema, &rows, ExportTarget::Server)
            .process(&mut writer)
            .unwrap();
        let server = std::fs::read_to_string(dir.path().join("items_server.lua")).unwrap();
        assert!(server.contains("[1] = {id = 1, price = 10.0}"));
        assert!(server.contains("[2] = {id = 2, price = 0.0}"));
    }

    #[test]
    fn test_export_keeps_hook_fields() {
        let dir = TempDir::new().unwrap();
        let sheet = items();
        let set = WorkbookSet::new();
        let mut hooks = HookRegistry::new();
        hooks
            .register_before(Phase::ServerBefore, "extra", &["Items"], |ctx| {
                for row in ctx.rows.iter_mut() {
                    row.insert("extra".to_string(), Value::Bool(true));
                }
                Ok(())
            })
            .unwrap();

        let (schema, rows) = BeforeProcessor::new(&sheet, &set, &hooks)
            .process(ExportTarget::Server)
            .unwrap();
        let mut writer = LuaWriter::new(dir.path(), "items").unwrap();
        ExportProcessor::new(&sheet, &schema, &rows, ExportTarget::Server)
            .process(&mut writer)
            .unwrap();
        let text = std::fs::read_to_string(dir.path().join("items.lua")).unwrap();
        assert!(text.contains("[1] = {id = 1, price = 10.0, extra = true}"));
    }

    #[test]
    fn test_after_hook_missing_sheet() {
        let dir = TempDir::new().unwrap();
        let mut hooks = HookRegistry::new();
        hooks
            .register_after(Phase::ClientAfter, "needs_items", &["Items"], |_| Ok(()))
            .unwrap();

        let data = IndexMap::new();
        let err = AfterProcessor::new(&data, ExportTarget::Client, dir.path())
            .process(&hooks)
            .unwrap_err();
        assert!(err.to_string().contains("needs_items"));
        assert!(err.to_string().contains("Items"));
    }

    #[test]
    fn test_after_hook_sees_only_declared_sheets() {
        let dir = TempDir::new().unwrap();
        let mut hooks = HookRegistry::new();
        hooks
            .register_after(Phase::ServerAfter, "count", &["B"], |ctx| {
                anyhow::ensure!(ctx.sheets.len() == 1, "expected one sheet");
                anyhow::ensure!(ctx.rows("A").is_err(), "A must be hidden");
                anyhow::ensure!(ctx.rows("B")?.len() == 2, "B has two rows");
                Ok(())
            })
            .unwrap();

        let mut data = IndexMap::new();
        data.insert("A".to_string(), vec![RowRecord::new()]);
        data.insert("B".to_string(), vec![RowRecord::new(), RowRecord::new()]);
        AfterProcessor::new(&data, ExportTarget::Server, dir.path())
            .process(&hooks)
            .unwrap();
    }
}
