use crate::schema::ValueType;
use thiserror::Error;

pub type CompileResult<T> = Result<T, CompileError>;

/// Where in a workbook an error was found.
///
/// Every sheet-level error carries one of these so the message can be acted on
/// without digging through logs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Location {
    pub file: String,
    pub sheet: String,
    /// A1-style cell name, empty when the error is not tied to a cell
    pub cell: String,
}

impl Location {
    pub fn sheet(file: impl Into<String>, sheet: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            sheet: sheet.into(),
            cell: String::new(),
        }
    }

    pub fn with_cell(mut self, cell: impl Into<String>) -> Self {
        self.cell = cell.into();
        self
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "file: {} sheet: {}", self.file, self.sheet)?;
        if !self.cell.is_empty() {
            write!(f, " cell: {}", self.cell)?;
        }
        Ok(())
    }
}

/// Why a cell's text was rejected by the value codec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueErrorKind {
    NotInteger,
    NotFloat,
    /// A true-token written in the wrong case, e.g. `true` instead of `TRUE`
    BoolCase,
    BoolUnsupported,
}

impl std::fmt::Display for ValueErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueErrorKind::NotInteger => write!(f, "not an integer"),
            ValueErrorKind::NotFloat => write!(f, "not a finite number"),
            ValueErrorKind::BoolCase => write!(f, "use upper case: T or TRUE"),
            ValueErrorKind::BoolUnsupported => {
                write!(f, "unsupported value, bool only accepts T or TRUE")
            }
        }
    }
}

/// Codec failure with no sheet context; callers wrap it into [`CompileError::Row`] with the cell location.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("'{text}' is not a valid {value_type}: {kind}")]
pub struct ValueFormatError {
    pub text: String,
    pub value_type: ValueType,
    pub kind: ValueErrorKind,
}

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Schema error ({location}): {message}")]
    Schema { location: Location, message: String },

    #[error("Row error ({location}): {message}")]
    Row { location: Location, message: String },

    #[error("Dependency error ({location}): {message}")]
    Dependency { location: Location, message: String },

    #[error("Hook error: {0}")]
    Hook(String),

    #[error("Load error: {0}")]
    Load(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Write error: {0}")]
    Write(String),
}

impl CompileError {
    pub fn schema(location: Location, message: impl Into<String>) -> Self {
        CompileError::Schema {
            location,
            message: message.into(),
        }
    }

    pub fn row(location: Location, message: impl Into<String>) -> Self {
        CompileError::Row {
            location,
            message: message.into(),
        }
    }

    pub fn dependency(location: Location, message: impl Into<String>) -> Self {
        CompileError::Dependency {
            location,
            message: message.into(),
        }
    }
}
