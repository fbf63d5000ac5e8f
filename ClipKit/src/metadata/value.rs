//! Column values returned by a metadata engine

/// A single column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Storage class name, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Blob(_) => "blob",
        }
    }
}

/// One result row, with values in the order the columns were requested.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Integer value; `None` for null or any other storage class.
    pub fn integer(&self, index: usize) -> Option<i64> {
        match self.get(index)? {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric value, accepting integer or real storage.
    pub fn real(&self, index: usize) -> Option<f64> {
        match self.get(index)? {
            Value::Integer(v) => Some(*v as f64),
            Value::Real(v) => Some(*v),
            _ => None,
        }
    }

    /// Text value. Blob storage is decoded as lossy UTF-8.
    pub fn text(&self, index: usize) -> Option<String> {
        match self.get(index)? {
            Value::Text(s) => Some(s.clone()),
            Value::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
            _ => None,
        }
    }

    /// Raw bytes. Text storage yields its UTF-8 bytes.
    pub fn blob(&self, index: usize) -> Option<&[u8]> {
        match self.get(index)? {
            Value::Blob(b) => Some(b),
            Value::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }
}
