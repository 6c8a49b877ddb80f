use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A single field value as it arrives from an export. The engine never
/// interprets values beyond ordering and display; search only ever looks
/// at `Str` variants.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    // Cross-type rank: numbers, then booleans, then strings, with nulls last
    // so they fall to the bottom of an ascending sort.
    fn type_rank(&self) -> u8 {
        match self {
            Value::Int(_) | Value::Float(_) => 0,
            Value::Bool(_) => 1,
            Value::Str(_) => 2,
            Value::Null => 3,
        }
    }

    /// Natural ordering used by the sort stage: numeric for numbers (Int and
    /// Float compare as one numeric class), lexicographic for strings,
    /// `false < true` for booleans. Mixed types order by rank.
    pub fn natural_cmp(&self, other: &Value) -> Ordering {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return a.partial_cmp(&b).unwrap_or(Ordering::Equal);
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Null, Value::Null) => Ordering::Equal,
            (a, b) => a.type_rank().cmp(&b.type_rank()),
        }
    }

    /// Cell text for rendering. Nulls render as `∅`.
    pub fn display(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Null => "∅".to_string(),
        }
    }
}

/// Anything the engine can read a named field out of. Concrete shape is the
/// caller's business; the engine only goes through this accessor.
pub trait Record {
    fn get(&self, field: &str) -> Option<&Value>;
}

/// Map-backed record as produced by the file loader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapRecord {
    fields: BTreeMap<String, Value>,
}

impl MapRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        self.fields.insert(field.into(), value);
        self
    }
}

impl Record for MapRecord {
    fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

impl FromIterator<(String, Value)> for MapRecord {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        MapRecord {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_compare_across_int_and_float() {
        assert_eq!(
            Value::Int(2).natural_cmp(&Value::Float(2.5)),
            Ordering::Less
        );
        assert_eq!(Value::Float(3.0).natural_cmp(&Value::Int(3)), Ordering::Equal);
        assert_eq!(Value::Int(10).natural_cmp(&Value::Int(9)), Ordering::Greater);
    }

    #[test]
    fn strings_compare_lexicographically() {
        assert_eq!(
            Value::str("abuja").natural_cmp(&Value::str("accra")),
            Ordering::Less
        );
    }

    #[test]
    fn nulls_sort_last() {
        assert_eq!(Value::Null.natural_cmp(&Value::str("z")), Ordering::Greater);
        assert_eq!(Value::Null.natural_cmp(&Value::Int(i64::MAX)), Ordering::Greater);
        assert_eq!(Value::Null.natural_cmp(&Value::Null), Ordering::Equal);
    }

    #[test]
    fn numbers_rank_before_strings() {
        assert_eq!(Value::Int(99).natural_cmp(&Value::str("1")), Ordering::Less);
    }

    #[test]
    fn null_displays_as_empty_set() {
        assert_eq!(Value::Null.display(), "∅");
        assert_eq!(Value::Bool(true).display(), "true");
    }

    #[test]
    fn map_record_lookup() {
        let r = MapRecord::new()
            .with("name", Value::str("Kwame"))
            .with("score", Value::Int(42));
        assert_eq!(r.get("score"), Some(&Value::Int(42)));
        assert_eq!(r.get("missing"), None);
    }
}
