//! Hierarchical Lua table writer
//!
//! Rows are merged into a tree keyed by their primary-key values: the first
//! key picks the top-level entry, each further key nests one level deeper and
//! the deepest node holds the row body.
//!
//! ```text
//! local data = {
//! 	["A"] = {
//! 		["X"] = {id = "A", sub = "X"},
//! 		["Y"] = {id = "A", sub = "Y"}
//! 	}
//! }
//!
//! return data
//! ```

use crate::error::{CompileError, CompileResult};
use crate::types::{Table, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const LUA_EXTENSION: &str = ".lua";

const LUA_KEYWORDS: [&str; 22] = [
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if",
    "in", "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

/// How a leaf body lists its values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// `name = value, ...`
    #[default]
    Dict,
    /// `value, ...`
    NameOmitted,
}

/// Whether a leaf body is wrapped in braces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextMode {
    #[default]
    WithinBraces,
    WithoutBraces,
}

/// A named value handed to the writer
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub name: String,
    pub value: Value,
}

impl Entry {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// `["text"]` for strings, `[value]` otherwise
    pub fn key_text(&self) -> String {
        match &self.value {
            Value::Str(s) => format!("[{}]", quote(s)),
            other => format!("[{}]", value_text(other)),
        }
    }

    pub fn name_text(&self) -> String {
        if is_lua_name(&self.name) {
            self.name.clone()
        } else {
            format!("[{}]", quote(&self.name))
        }
    }

    pub fn value_text(&self) -> String {
        value_text(&self.value)
    }

    pub fn key_value_text(&self) -> String {
        format!("{} = {}", self.name_text(), self.value_text())
    }
}

/// Lua literal for a value
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format!("{:?}", f),
        Value::Str(s) => quote(s),
        Value::Bool(b) => b.to_string(),
        Value::Table(Table::List(items)) => {
            let parts: Vec<String> = items.iter().map(value_text).collect();
            format!("{{{}}}", parts.join(", "))
        }
        Value::Table(Table::Map(entries)) => {
            let parts: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("[{}] = {}", value_text(k), value_text(v)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn is_lua_name(name: &str) -> bool {
    let mut chars = name.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    valid_start
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !LUA_KEYWORDS.contains(&name)
}

/// `<tabs>key = {value}`; `expand` puts the value on its own lines
fn format_key_value(key: &str, value: &str, tabs: usize, expand: bool, braces: bool) -> String {
    let indent = "\t".repeat(tabs);
    let mut s = format!("{}{} = ", indent, key);
    if braces {
        s.push('{');
    }
    if expand {
        s.push('\n');
    }
    s.push_str(value);
    if expand {
        s.push('\n');
        s.push_str(&indent);
    }
    if braces {
        s.push('}');
    }
    s
}

#[derive(Debug)]
struct Node {
    key: String,
    depth: usize,
    children: Vec<usize>,
    body: Option<(String, TextMode)>,
}

impl Node {
    fn dump(&self, nodes: &[Node]) -> String {
        let tabs = self.depth + 1;
        if self.children.is_empty() {
            let (body, mode) = match &self.body {
                Some((body, mode)) => (body.as_str(), *mode),
                None => ("", TextMode::WithinBraces),
            };
            return format_key_value(&self.key, body, tabs, false, mode == TextMode::WithinBraces);
        }

        let children: Vec<String> = self.children.iter().map(|&c| nodes[c].dump(nodes)).collect();
        format_key_value(&self.key, &children.join(",\n"), tabs, true, true)
    }
}

/// Accumulates rows for one output file
#[derive(Debug)]
pub struct LuaWriter {
    dir: PathBuf,
    file_name: String,
    nodes: Vec<Node>,
    /// `|`-joined key-text path → node index
    paths: HashMap<String, usize>,
    roots: Vec<usize>,
}

impl LuaWriter {
    /// Writer for `<dir>/<file_name>.lua`
    pub fn new<P: AsRef<Path>>(dir: P, file_name: &str) -> CompileResult<Self> {
        let dir = dir.as_ref();
        if dir.as_os_str().is_empty() {
            return Err(CompileError::Write("no output directory given".to_string()));
        }
        if file_name.is_empty() {
            return Err(CompileError::Write("no output file name given".to_string()));
        }

        let file_name = if file_name.ends_with(LUA_EXTENSION) {
            file_name.to_string()
        } else {
            format!("{}{}", file_name, LUA_EXTENSION)
        };

        Ok(Self {
            dir: dir.to_path_buf(),
            file_name,
            nodes: Vec::new(),
            paths: HashMap::new(),
            roots: Vec::new(),
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    /// Number of top-level entries written so far
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Add one row: `keys` are its primary entries outermost first, `values`
    /// everything that goes into the body.
    pub fn write(
        &mut self,
        keys: &[Entry],
        values: &[Entry],
        write_mode: WriteMode,
        text_mode: TextMode,
    ) -> CompileResult<()> {
        if keys.is_empty() {
            return Err(CompileError::Write(format!(
                "write to {} without primary key",
                self.file_name
            )));
        }
        if write_mode == WriteMode::NameOmitted
            && text_mode == TextMode::WithoutBraces
            && values.len() != 1
        {
            return Err(CompileError::Write(format!(
                "write to {} failed: {} values cannot be written without braces",
                self.file_name,
                values.len()
            )));
        }

        let body = match write_mode {
            WriteMode::Dict => values
                .iter()
                .map(Entry::key_value_text)
                .collect::<Vec<_>>()
                .join(", "),
            WriteMode::NameOmitted => values
                .iter()
                .map(Entry::value_text)
                .collect::<Vec<_>>()
                .join(", "),
        };

        let mut path = String::new();
        let mut parent: Option<usize> = None;
        let last = keys.len() - 1;
        for (depth, key) in keys.iter().enumerate() {
            let key_text = key.key_text();
            if depth > 0 {
                path.push('|');
            }
            path.push_str(&key_text);

            let index = match self.paths.get(&path) {
                Some(&index) => {
                    if depth == last {
                        warn!(
                            file = %self.file_name,
                            path = %path,
                            "duplicate key path, keeping the first row"
                        );
                    }
                    index
                }
                None => {
                    let index = self.nodes.len();
                    self.nodes.push(Node {
                        key: key_text,
                        depth,
                        children: Vec::new(),
                        body: (depth == last).then(|| (body.clone(), text_mode)),
                    });
                    self.paths.insert(path.clone(), index);
                    match parent {
                        Some(p) => self.nodes[p].children.push(index),
                        None => self.roots.push(index),
                    }
                    index
                }
            };
            parent = Some(index);
        }
        Ok(())
    }

    /// Serialize every top-level entry into a Lua module
    pub fn dump_to_string(&self) -> String {
        let entries: Vec<String> = self
            .roots
            .iter()
            .map(|&r| self.nodes[r].dump(&self.nodes))
            .collect();
        let mut text = format_key_value("local data", &entries.join(",\n"), 0, true, true);
        text.push_str("\n\nreturn data");
        text
    }

    /// Write the module to `<dir>/<file_name>`, creating the directory if needed
    pub fn dump_to_file(&self) -> CompileResult<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path();
        fs::write(&path, self.dump_to_string())?;
        Ok(path)
    }
}
