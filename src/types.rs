use indexmap::IndexMap;

//==============================================================================
// Typed cell values
//==============================================================================

/// A parsed cell value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Table(Table),
}

/// Nested value parsed from a `table` cell
#[derive(Debug, Clone, PartialEq)]
pub enum Table {
    List(Vec<Value>),
    /// Insertion-ordered key/value pairs; keys are scalars
    Map(Vec<(Value, Value)>),
}

impl Table {
    pub fn empty() -> Self {
        Table::Map(Vec::new())
    }

    /// Set `key` to `value`, overwriting an existing entry in place.
    ///
    /// On a list this appends a single-entry map instead.
    pub fn insert(&mut self, key: Value, value: Value) {
        match self {
            Table::Map(entries) => {
                if let Some(slot) = entries.iter_mut().find(|(k, _)| *k == key) {
                    slot.1 = value;
                } else {
                    entries.push((key, value));
                }
            }
            Table::List(items) => items.push(Value::Table(Table::Map(vec![(key, value)]))),
        }
    }

    /// Append a scalar. A map is first turned into a list of single-entry maps
    /// so the table keeps one shape.
    pub fn push(&mut self, value: Value) {
        if let Table::Map(entries) = self {
            let items = std::mem::take(entries)
                .into_iter()
                .map(|(k, v)| Value::Table(Table::Map(vec![(k, v)])))
                .collect();
            *self = Table::List(items);
        }
        if let Table::List(items) = self {
            items.push(value);
        }
    }

    /// Map keys, or list elements when the table is list-shaped
    pub fn members(&self) -> Vec<&Value> {
        match self {
            Table::List(items) => items.iter().collect(),
            Table::Map(entries) => entries.iter().map(|(k, _)| k).collect(),
        }
    }
}

impl Value {
    /// Text form used when matching against another sheet's cells.
    ///
    /// Tables have no cell representation and return `None`.
    pub fn cell_text(&self) -> Option<String> {
        match self {
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Str(s) => Some(s.clone()),
            Value::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
            Value::Table(_) => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Table> for Value {
    fn from(v: Table) -> Self {
        Value::Table(v)
    }
}

//==============================================================================
// Row records
//==============================================================================

/// One data row for one export target: field key → value, in column order.
///
/// Before-hooks may add, remove or rewrite entries.
pub type RowRecord = IndexMap<String, Value>;
