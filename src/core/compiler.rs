//! Export orchestration: before → export → after, for every mapped sheet

use crate::config::ExportConfig;
use crate::core::processor::{AfterProcessor, BeforeProcessor, ExportProcessor};
use crate::error::CompileResult;
use crate::excel::WorkbookSet;
use crate::hooks::HookRegistry;
use crate::schema::ExportTarget;
use crate::types::RowRecord;
use crate::writer::LuaWriter;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// What a finished run produced
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CompileSummary {
    /// Sheets that were compiled, in export order
    pub sheets: Vec<String>,
    /// Export-map sheets that no workbook contains
    pub skipped: Vec<String>,
    /// Lua files written by the row export (hook output not included)
    pub files: Vec<PathBuf>,
}

pub struct Compiler<'a> {
    workbooks: &'a WorkbookSet,
    hooks: &'a HookRegistry,
    config: &'a ExportConfig,
    staging_dir: PathBuf,
}

impl<'a> Compiler<'a> {
    pub fn new<P: AsRef<Path>>(
        workbooks: &'a WorkbookSet,
        hooks: &'a HookRegistry,
        config: &'a ExportConfig,
        staging_dir: P,
    ) -> Self {
        Self {
            workbooks,
            hooks,
            config,
            staging_dir: staging_dir.as_ref().to_path_buf(),
        }
    }

    /// Staging directory of one target
    pub fn target_dir(&self, target: ExportTarget) -> PathBuf {
        self.staging_dir.join(target.dir_name())
    }

    /// Compile every sheet of the export map; the first error aborts the run
    pub fn compile(&self) -> CompileResult<CompileSummary> {
        let mut summary = CompileSummary::default();
        let mut data: IndexMap<ExportTarget, IndexMap<String, Vec<RowRecord>>> = ExportTarget::ALL
            .iter()
            .map(|&t| (t, IndexMap::new()))
            .collect();

        for (sheet_name, targets) in self.config.iter() {
            let Some(sheet) = self.workbooks.get(sheet_name) else {
                warn!(sheet = %sheet_name, "sheet not found in any workbook, skipping");
                summary.skipped.push(sheet_name.to_string());
                continue;
            };

            let processor = BeforeProcessor::new(sheet, self.workbooks, self.hooks);
            for (&target, file_name) in targets {
                info!(
                    file = %sheet.file_label(),
                    sheet = %sheet_name,
                    target = %target,
                    "exporting"
                );
                let (schema, rows) = processor.process(target)?;

                let mut writer = LuaWriter::new(self.target_dir(target), file_name)?;
                ExportProcessor::new(sheet, &schema, &rows, target).process(&mut writer)?;
                info!(path = %writer.path().display(), rows = rows.len(), "wrote");

                summary.files.push(writer.path());
                data.entry(target)
                    .or_default()
                    .insert(sheet_name.to_string(), rows);
            }
            summary.sheets.push(sheet_name.to_string());
        }

        for target in ExportTarget::ALL {
            let Some(sheets) = data.get(&target) else {
                continue;
            };
            let output_dir = self.target_dir(target);
            AfterProcessor::new(sheets, target, &output_dir).process(self.hooks)?;
        }

        Ok(summary)
    }
}
