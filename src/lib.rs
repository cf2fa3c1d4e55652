//! xlsforge - schema-driven spreadsheet → Lua data compiler
//!
//! Reads game-design workbooks whose sheets declare their columns in eight
//! header rows, validates every row against that schema and against other
//! sheets, and writes one Lua data module per sheet for the client and the
//! server.
//!
//! # Example
//!
//! ```no_run
//! use xlsforge::config::ExportConfig;
//! use xlsforge::core::Compiler;
//! use xlsforge::excel::WorkbookSet;
//! use xlsforge::hooks::HookRegistry;
//! use xlsforge::schema::ExportTarget;
//!
//! let workbooks = WorkbookSet::load_dir("design/tables")?;
//! let hooks = HookRegistry::new();
//! let mut config = ExportConfig::new();
//! config.add("物品表", ExportTarget::Client, "item");
//!
//! let summary = Compiler::new(&workbooks, &hooks, &config, "out").compile()?;
//! println!("Compiled: {:?}", summary.sheets);
//! # Ok::<(), xlsforge::error::CompileError>(())
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod excel;
pub mod hooks;
pub mod schema;
pub mod types;
pub mod writer;

// Re-export commonly used types
pub use error::{CompileError, CompileResult};
pub use types::{RowRecord, Table, Value};
