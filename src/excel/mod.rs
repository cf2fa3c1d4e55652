//! Spreadsheet input
//!
//! Workbooks are read with calamine and flattened into sheets of cell text;
//! typing happens later, against each sheet's header rows.

mod loader;

pub use loader::{cell_text, Sheet, Workbook, WorkbookSet, WORKBOOK_EXTENSIONS};
