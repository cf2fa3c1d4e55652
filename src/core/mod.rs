//! Sheet compilation: value codec, validation, row processing and orchestration

pub mod compiler;
pub mod dependency;
pub mod processor;
pub mod validator;
pub mod value_codec;

pub use compiler::{CompileSummary, Compiler};
pub use processor::{AfterProcessor, BeforeProcessor, ExportProcessor};
pub use validator::{FieldDef, SheetSchema};
