//! Register values.

use std::fmt;

/// Tagged value held by a register: an unsigned integer or owned text.
///
/// Text is kept as the raw bytes the program supplied. Nothing requires it
/// to be UTF-8; it is only decoded for display and numeric parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(u32),
    Text(Vec<u8>),
}

impl Value {
    /// Returns the kind name for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Integer(_) => "Integer",
            Value::Text(_) => "Text",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Value::Integer(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Value::Text(_))
    }

    /// Same kind and same payload. Text compares byte for byte.
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Integer(0)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "Decimal:{n:04} Hex:{n:04X}"),
            Value::Text(s) => write!(f, "str: {}", String::from_utf8_lossy(s)),
        }
    }
}
