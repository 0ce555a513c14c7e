use super::program::VariableId;

/// Runtime value of the block VM.
///
/// Values are the only data that can live on the operand stack or in a
/// variable slot. They are copied by value; an array copy is a deep copy.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// The value of anything that was never assigned.
    #[default]
    Undefined,

    /// Deferred read of a variable.
    ///
    /// Not a concrete value: it must be resolved against the current
    /// scopes before its contents can be inspected.
    VariableRef(VariableId),

    /// 64-bit signed integer.
    Integer(i64),

    /// UTF-8 string value.
    String(String),

    /// Boolean value.
    Boolean(bool),

    /// Growable, index-addressed sequence.
    Array(Vec<Value>),
}

/// A coercion was asked of a value carrying a different tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("type mismatch: expected {expected}, got {found}")]
pub struct TypeMismatch {
    pub expected: &'static str,
    pub found: &'static str,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::VariableRef(_) => "variable reference",
            Value::Integer(_) => "integer",
            Value::String(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Array(_) => "array",
        }
    }

    fn mismatch(&self, expected: &'static str) -> TypeMismatch {
        TypeMismatch {
            expected,
            found: self.type_name(),
        }
    }

    pub fn to_integer(&self) -> Result<i64, TypeMismatch> {
        match self {
            Value::Integer(n) => Ok(*n),
            other => Err(other.mismatch("integer")),
        }
    }

    pub fn to_text(&self) -> Result<&str, TypeMismatch> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(other.mismatch("string")),
        }
    }

    pub fn to_bool(&self) -> Result<bool, TypeMismatch> {
        match self {
            Value::Boolean(b) => Ok(*b),
            other => Err(other.mismatch("boolean")),
        }
    }

    /// Coerce to an array index. Indices are non-negative integers.
    pub fn to_index(&self) -> Result<usize, TypeMismatch> {
        let n = self.to_integer()?;
        usize::try_from(n).map_err(|_| TypeMismatch {
            expected: "non-negative integer index",
            found: "negative integer",
        })
    }

    /// Language-level `==`.
    ///
    /// Two strings compare by text. Any other pair compares as booleans,
    /// so both sides must be booleans.
    pub fn equals(&self, other: &Value) -> Result<bool, TypeMismatch> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Ok(a == b),
            _ => Ok(self.to_bool()? == other.to_bool()?),
        }
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Value::VariableRef(_))
    }
}

impl std::fmt::Display for Value {
    /// Textual form written by `DebugWrite`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::VariableRef(id) => write!(f, "&{}", id),
            Value::Integer(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}
