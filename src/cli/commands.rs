use crate::config::ExportConfig;
use crate::core::{CompileSummary, Compiler};
use crate::error::CompileResult;
use crate::excel::WorkbookSet;
use crate::hooks::{builtin, HookRegistry};
use crate::schema::ExportTarget;
use crate::writer::LUA_EXTENSION;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Scratch directory, relative to the working directory, that receives output before it is published
pub const DEFAULT_STAGING_DIR: &str = ".export_table_temp";

/// Maximum number of suggestions printed by `find_sheet`
pub const MAX_SUGGESTIONS: usize = 5;

/// Compile every sheet of the export map and publish the Lua files.
///
/// Output is staged first and copied to `client_output`/`server_output` only
/// once the whole run has succeeded.
pub fn compile(
    excel_path: &Path,
    client_output: &Path,
    server_output: &Path,
    export_config: Option<&Path>,
    staging_dir: &Path,
) -> CompileResult<CompileSummary> {
    println!("{}", "xlsforge - Compiling workbooks".bold().green());
    println!("   Excel:  {}", excel_path.display());
    println!("   Client: {}", client_output.display());
    println!("   Server: {}\n", server_output.display());

    let workbooks = WorkbookSet::load_dir(excel_path)?;
    info!(sheets = workbooks.len(), "workbooks loaded");

    let mut hooks = HookRegistry::new();
    let config = match export_config {
        Some(path) => {
            println!("   Export config: {}", path.display());
            ExportConfig::from_file(path)?
        }
        None => {
            builtin::register_project_hooks(&mut hooks)?;
            ExportConfig::builtin()
        }
    };

    clear_staging(staging_dir)?;
    let compiler = Compiler::new(&workbooks, &hooks, &config, staging_dir);
    let summary = compiler.compile()?;

    let mut published = 0;
    for (target, output) in [
        (ExportTarget::Client, client_output),
        (ExportTarget::Server, server_output),
    ] {
        published += publish(&compiler.target_dir(target), output)?;
    }

    for sheet in &summary.skipped {
        println!("   {} sheet {} not found, skipped", "⚠".yellow(), sheet.bright_yellow());
    }
    println!(
        "   {} sheets compiled, {} files published\n",
        summary.sheets.len(),
        published
    );

    Ok(summary)
}

/// Print the file that owns `name`, or the closest sheet names
pub fn find_sheet(excel_path: &Path, name: &str) -> CompileResult<()> {
    let workbooks = WorkbookSet::load_dir(excel_path)?;

    if let Some(file) = workbooks.sheet_file(name) {
        println!("{} → {}", name.bold(), file.display().to_string().bright_blue());
        return Ok(());
    }

    let suggestions = workbooks.similar_sheets(name, MAX_SUGGESTIONS);
    if suggestions.is_empty() {
        println!("{} not found", name.bold());
        return Ok(());
    }

    println!("{} not found, did you mean:", name.bold());
    for suggestion in suggestions {
        let file = workbooks
            .sheet_file(suggestion)
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        println!("   {} → {}", suggestion.bright_yellow(), file);
    }
    Ok(())
}

/// Empty the per-target staging directories left by a previous run
fn clear_staging(staging_dir: &Path) -> CompileResult<()> {
    for target in ExportTarget::ALL {
        let dir = staging_dir.join(target.dir_name());
        if dir.exists() {
            debug!(dir = %dir.display(), "clearing staging directory");
            fs::remove_dir_all(&dir)?;
        }
    }
    Ok(())
}

/// Copy every `.lua` file of `from` into `to`; returns the number copied
fn publish(from: &Path, to: &Path) -> CompileResult<usize> {
    if !from.is_dir() {
        return Ok(0);
    }
    fs::create_dir_all(to)?;

    let mut files: Vec<PathBuf> = fs::read_dir(from)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()?;
    files.retain(|p| p.is_file() && p.to_string_lossy().ends_with(LUA_EXTENSION));
    files.sort();

    for file in &files {
        if let Some(name) = file.file_name() {
            fs::copy(file, to.join(name))?;
            debug!(file = %file.display(), to = %to.display(), "published");
        }
    }
    Ok(files.len())
}
