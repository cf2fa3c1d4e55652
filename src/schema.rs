//! Fixed sheet layout and value vocabulary
//!
//! Every compiled sheet starts with eight header rows describing its columns:
//!
//! | row | content                                   |
//! |-----|-------------------------------------------|
//! | 0   | free-form label row, ignored              |
//! | 1   | display name                              |
//! | 2   | field key (identifier)                    |
//! | 3   | value type                                |
//! | 4   | primary key flag (`Y` or empty)           |
//! | 5   | required flag (`Y` or empty)              |
//! | 6   | dependency expressions (`;`-separated)    |
//! | 7   | export target (`c`, `s`, `cs` or empty)   |
//!
//! Column 0 holds row labels and is never exported.

use std::fmt;

pub const HEADER_ROWS: usize = 8;
pub const ROW_NAME: usize = 1;
pub const ROW_KEY: usize = 2;
pub const ROW_TYPE: usize = 3;
pub const ROW_PRIMARY: usize = 4;
pub const ROW_REQUIRED: usize = 5;
pub const ROW_DEPENDS: usize = 6;
pub const ROW_TARGET: usize = 7;

/// First field column; column 0 is reserved for row labels
pub const COL_START: usize = 1;

/// Marker used in the primary and required rows
pub const FLAG_YES: &str = "Y";

pub const BOOL_TRUE_VALUES: [&str; 2] = ["T", "TRUE"];

pub const FLOAT_DECIMAL_MIN: u32 = 0;
pub const FLOAT_DECIMAL_MAX: u32 = 5;
pub const FLOAT_DECIMAL_DEFAULT: u32 = 2;

pub const KEY_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

/// Declared type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Int,
    /// Float rounded to the given number of decimal places
    Float(u32),
    Str,
    Bool,
    Table,
}

impl ValueType {
    /// Parse a type cell. Float digit counts are clamped to the supported range.
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "int" => Some(ValueType::Int),
            "string" => Some(ValueType::Str),
            "bool" => Some(ValueType::Bool),
            "table" => Some(ValueType::Table),
            "float" => Some(ValueType::Float(FLOAT_DECIMAL_DEFAULT)),
            other => {
                let digits = other.strip_prefix("float,")?;
                let digits: i64 = digits.trim().parse().ok()?;
                let clamped = digits.clamp(FLOAT_DECIMAL_MIN as i64, FLOAT_DECIMAL_MAX as i64);
                Some(ValueType::Float(clamped as u32))
            }
        }
    }

    /// Parse a type cell as the header validator does: out-of-range float
    /// digit counts are rejected instead of clamped.
    pub fn parse_strict(text: &str) -> Option<Self> {
        if let Some(digits) = text.strip_prefix("float,") {
            let digits: i64 = digits.trim().parse().ok()?;
            if !(FLOAT_DECIMAL_MIN as i64..=FLOAT_DECIMAL_MAX as i64).contains(&digits) {
                return None;
            }
        }
        Self::parse(text)
    }

    /// Whether a column of this type may be a primary key
    pub fn is_key_type(&self) -> bool {
        !matches!(self, ValueType::Table)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Int => write!(f, "int"),
            ValueType::Float(d) => write!(f, "float,{}", d),
            ValueType::Str => write!(f, "string"),
            ValueType::Bool => write!(f, "bool"),
            ValueType::Table => write!(f, "table"),
        }
    }
}

/// Supported type names, for error messages
pub const ALL_VALUE_TYPES: [&str; 5] = ["int", "float", "string", "bool", "table"];

/// One side of the export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExportTarget {
    Client,
    Server,
}

impl ExportTarget {
    pub const ALL: [ExportTarget; 2] = [ExportTarget::Client, ExportTarget::Server];

    pub fn code(&self) -> &'static str {
        match self {
            ExportTarget::Client => "c",
            ExportTarget::Server => "s",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "c" => Some(ExportTarget::Client),
            "s" => Some(ExportTarget::Server),
            _ => None,
        }
    }

    /// Subdirectory name used in the staging area
    pub fn dir_name(&self) -> &'static str {
        match self {
            ExportTarget::Client => "client",
            ExportTarget::Server => "server",
        }
    }
}

impl fmt::Display for ExportTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Content of the export-target header cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFlag {
    None,
    Client,
    Server,
    Both,
}

impl TargetFlag {
    pub const ACCEPTED: [&'static str; 3] = ["c", "s", "cs"];

    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "" => Some(TargetFlag::None),
            "c" => Some(TargetFlag::Client),
            "s" => Some(TargetFlag::Server),
            "cs" => Some(TargetFlag::Both),
            _ => None,
        }
    }

    pub fn is_exported(&self) -> bool {
        !matches!(self, TargetFlag::None)
    }

    pub fn includes(&self, target: ExportTarget) -> bool {
        matches!(
            (self, target),
            (TargetFlag::Both, _)
                | (TargetFlag::Client, ExportTarget::Client)
                | (TargetFlag::Server, ExportTarget::Server)
        )
    }
}

/// Pipeline phase a hook is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    ClientBefore,
    ClientAfter,
    ServerBefore,
    ServerAfter,
}

impl Phase {
    pub fn before(target: ExportTarget) -> Self {
        match target {
            ExportTarget::Client => Phase::ClientBefore,
            ExportTarget::Server => Phase::ServerBefore,
        }
    }

    pub fn after(target: ExportTarget) -> Self {
        match target {
            ExportTarget::Client => Phase::ClientAfter,
            ExportTarget::Server => Phase::ServerAfter,
        }
    }

    pub fn is_before(&self) -> bool {
        matches!(self, Phase::ClientBefore | Phase::ServerBefore)
    }

    pub fn target(&self) -> ExportTarget {
        match self {
            Phase::ClientBefore | Phase::ClientAfter => ExportTarget::Client,
            Phase::ServerBefore | Phase::ServerAfter => ExportTarget::Server,
        }
    }
}

/// Convert a zero-based column index to its spreadsheet letter (0→A, 25→Z, 26→AA)
pub fn column_letter(n: usize) -> String {
    let mut result = String::new();
    let mut num = n;

    loop {
        let remainder = num % 26;
        result.insert(0, (b'A' + remainder as u8) as char);
        if num < 26 {
            break;
        }
        num = num / 26 - 1;
    }

    result
}

/// Human-readable A1 cell name for zero-based coordinates
pub fn cell_name(row: usize, col: usize) -> String {
    format!("{}{}", column_letter(col), row + 1)
}
