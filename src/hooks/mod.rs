//! Sheet-scoped transformation hooks
//!
//! Hooks run around the row export of each target:
//!
//! - **before** hooks see one sheet's freshly built records and may rewrite
//!   them in place before they are written
//! - **after** hooks run once every sheet is written, get read-only access to
//!   the sheets they name and may emit extra output files
//!
//! The registry is built once at startup and handed to the compiler. Hooks run
//! in registration order.

pub mod builtin;

use crate::error::{CompileError, CompileResult};
use crate::schema::{ExportTarget, Phase};
use crate::types::RowRecord;
use crate::writer::LuaWriter;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::Path;

pub type BeforeFn = dyn Fn(&mut BeforeContext<'_>) -> anyhow::Result<()>;
pub type AfterFn = dyn Fn(&AfterContext<'_>) -> anyhow::Result<()>;

/// Input of a before-hook: the records of the single sheet it is bound to
pub struct BeforeContext<'a> {
    pub sheet: &'a str,
    pub target: ExportTarget,
    pub rows: &'a mut Vec<RowRecord>,
}

/// Input of an after-hook: snapshots of the sheets it declared
pub struct AfterContext<'a> {
    pub target: ExportTarget,
    pub sheets: IndexMap<&'a str, &'a [RowRecord]>,
    /// Directory generated files for this target go to
    pub output_dir: &'a Path,
}

impl AfterContext<'_> {
    pub fn rows(&self, sheet: &str) -> anyhow::Result<&[RowRecord]> {
        self.sheets
            .get(sheet)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("sheet {} was not declared by this hook", sheet))
    }

    /// Writer for an extra file next to this target's regular output
    pub fn writer(&self, file_name: &str) -> anyhow::Result<LuaWriter> {
        Ok(LuaWriter::new(self.output_dir, file_name)?)
    }
}

pub struct BeforeHook {
    pub name: String,
    pub sheet: String,
    pub run: Box<BeforeFn>,
}

pub struct AfterHook {
    pub name: String,
    pub sheets: Vec<String>,
    pub run: Box<AfterFn>,
}

#[derive(Default)]
pub struct HookRegistry {
    before: HashMap<ExportTarget, Vec<BeforeHook>>,
    after: HashMap<ExportTarget, Vec<AfterHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a before-hook. It must name exactly one sheet.
    pub fn register_before<F>(
        &mut self,
        phase: Phase,
        name: &str,
        sheets: &[&str],
        hook: F,
    ) -> CompileResult<&mut Self>
    where
        F: Fn(&mut BeforeContext<'_>) -> anyhow::Result<()> + 'static,
    {
        if !phase.is_before() {
            return Err(CompileError::Hook(format!(
                "hook {} registered as before-hook on after phase {:?}",
                name, phase
            )));
        }
        let [sheet] = sheets else {
            return Err(CompileError::Hook(format!(
                "before-hook {} must reference exactly 1 sheet, got {}",
                name,
                sheets.len()
            )));
        };

        self.before.entry(phase.target()).or_default().push(BeforeHook {
            name: name.to_string(),
            sheet: sheet.to_string(),
            run: Box::new(hook),
        });
        Ok(self)
    }

    /// Bind an after-hook. It must name at least one sheet.
    pub fn register_after<F>(
        &mut self,
        phase: Phase,
        name: &str,
        sheets: &[&str],
        hook: F,
    ) -> CompileResult<&mut Self>
    where
        F: Fn(&AfterContext<'_>) -> anyhow::Result<()> + 'static,
    {
        if phase.is_before() {
            return Err(CompileError::Hook(format!(
                "hook {} registered as after-hook on before phase {:?}",
                name, phase
            )));
        }
        if sheets.is_empty() {
            return Err(CompileError::Hook(format!(
                "after-hook {} references no sheet",
                name
            )));
        }

        self.after.entry(phase.target()).or_default().push(AfterHook {
            name: name.to_string(),
            sheets: sheets.iter().map(|s| s.to_string()).collect(),
            run: Box::new(hook),
        });
        Ok(self)
    }

    pub fn before_hooks(&self, target: ExportTarget) -> &[BeforeHook] {
        self.before.get(&target).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn after_hooks(&self, target: ExportTarget) -> &[AfterHook] {
        self.after.get(&target).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Before-hooks of `target` bound to `sheet`, in registration order
    pub fn before_hooks_for<'a>(
        &'a self,
        target: ExportTarget,
        sheet: &'a str,
    ) -> impl Iterator<Item = &'a BeforeHook> + 'a {
        self.before_hooks(target)
            .iter()
            .filter(move |h| h.sheet == sheet)
    }

    /// Names of the hooks bound to `phase`, in registration order
    pub fn hook_names(&self, phase: Phase) -> Vec<&str> {
        let target = phase.target();
        if phase.is_before() {
            self.before_hooks(target).iter().map(|h| h.name.as_str()).collect()
        } else {
            self.after_hooks(target).iter().map(|h| h.name.as_str()).collect()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.before.values().all(Vec::is_empty) && self.after.values().all(Vec::is_empty)
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("client_before", &self.hook_names(Phase::ClientBefore))
            .field("client_after", &self.hook_names(Phase::ClientAfter))
            .field("server_before", &self.hook_names(Phase::ServerBefore))
            .field("server_after", &self.hook_names(Phase::ServerAfter))
            .finish()
    }
}
