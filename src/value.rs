use std::collections::HashMap;
use std::fmt;

/// A runtime value produced by evaluating an expression.
///
/// Values mirror the JSON data model with a distinction between integers and
/// floats. Literal numbers without a fractional part parse as `Integer`.
///
/// # Examples
///
/// ```
/// use tarragon::Value;
/// use std::collections::HashMap;
///
/// let name = Value::String("Alice".to_string());
/// let list = Value::Array(vec![Value::Integer(1), Value::Float(2.5)]);
///
/// let mut obj = HashMap::new();
/// obj.insert("name".to_string(), name);
/// let user = Value::Object(obj);
///
/// assert_eq!(user.get_path("name"), Value::String("Alice".to_string()));
/// assert_eq!(user.get_path("missing"), Value::Null);
/// assert!(list.is_truthy());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent or empty value
    #[default]
    Null,

    Boolean(bool),

    Float(f64),

    /// Integer number (preserved separately from floats)
    Integer(i64),

    String(String),

    Array(Vec<Value>),

    Object(HashMap<String, Value>),
}

impl Value {
    /// Check if the value is truthy (for conditions)
    pub fn is_truthy(&self) -> bool {
        use Value::*;
        match self {
            Null => false,
            Boolean(b) => *b,
            Float(n) => *n != 0.0,
            Integer(n) => *n != 0,
            String(s) => !s.is_empty() && !s.eq_ignore_ascii_case("false"),
            Array(arr) => !arr.is_empty(),
            Object(obj) => !obj.is_empty(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Get as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Float(n) => Some(n.round() as i64),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Get as string (concatenation)
    pub fn as_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Elements to iterate over in `each`, `filter`, `map` and friends.
    ///
    /// `null` iterates as empty, a scalar or object as a single element.
    pub fn iter_elements(&self) -> Vec<Value> {
        match self {
            Value::Null => Vec::new(),
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        }
    }

    /// Returns a human-readable type name
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Project a dotted path (`a.b.c`) off this value.
    ///
    /// Object segments are looked up by key, numeric segments index arrays.
    /// Any miss yields `Null`.
    pub fn get_path(&self, path: &str) -> Value {
        let mut current = self;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            current = match current {
                Value::Object(obj) => match obj.get(segment) {
                    Some(v) => v,
                    None => return Value::Null,
                },
                Value::Array(items) => match segment.parse::<usize>() {
                    Ok(idx) if idx < items.len() => &items[idx],
                    _ => return Value::Null,
                },
                _ => return Value::Null,
            };
        }
        current.clone()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{b}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s}"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Object(obj) => {
                // Sort keys for deterministic output
                let mut keys: Vec<_> = obj.keys().collect();
                keys.sort();
                write!(f, "{{")?;
                for (i, key) in keys.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key}: {}", obj[*key])?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Integer(0).is_truthy());
        assert!(Value::Integer(-1).is_truthy());
        assert!(!Value::from("false").is_truthy());
        assert!(Value::from("yes").is_truthy());
        assert!(!Value::Array(vec![]).is_truthy());
    }

    #[test]
    fn path_projection_through_arrays() {
        let mut inner = HashMap::new();
        inner.insert("id".to_string(), Value::Integer(7));
        let mut outer = HashMap::new();
        outer.insert(
            "items".to_string(),
            Value::Array(vec![Value::Object(inner)]),
        );
        let doc = Value::Object(outer);

        assert_eq!(doc.get_path("items.0.id"), Value::Integer(7));
        assert_eq!(doc.get_path(".items.0.id"), Value::Integer(7));
        assert_eq!(doc.get_path("items.3.id"), Value::Null);
        assert_eq!(doc.get_path("items.0.id.deeper"), Value::Null);
    }

    #[test]
    fn display_renders_nested_values() {
        let v = Value::Array(vec![Value::Integer(1), Value::from("a"), Value::Null]);
        assert_eq!(v.to_string(), "[1, a, null]");
        assert_eq!(Value::Null.as_string(), "");
    }
}
