pub use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
pub use rust_decimal::Decimal;

/// Canonical field separator byte.
pub const SOH: u8 = 0x01;

pub type Int = i64;
pub type UtcTimestamp = DateTime<Utc>;

/// A decoded field value.
///
/// Templates drive interpretation; the payload container is deliberately
/// generic, so one sum type covers every value type of the dictionary.
/// `Absent` is the distinguished sentinel for an empty wire value: it is
/// what an empty byte slice decodes to and it encodes back to an empty
/// byte slice.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Absent,
    Int(Int),
    Decimal(Decimal),
    Double(f64),
    Str(String),
    Bool(bool),
    List(Vec<String>),
    Timestamp(UtcTimestamp),
    Time(NaiveTime),
    Date(NaiveDate),
    /// Repeating group occurrences, keyed by the group's count field.
    Groups(Vec<FieldMap>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<Int> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_groups(&self) -> Option<&[FieldMap]> {
        match self {
            Value::Groups(occurrences) => Some(occurrences),
            _ => None,
        }
    }
}

impl From<Int> for Value {
    fn from(value: Int) -> Value {
        Value::Int(value)
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Value {
        Value::Decimal(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Value {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Value {
        Value::Str(value.to_owned())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Value {
        Value::Str(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Value {
        Value::Bool(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(values: Vec<String>) -> Value {
        Value::List(values)
    }
}

impl From<UtcTimestamp> for Value {
    fn from(value: UtcTimestamp) -> Value {
        Value::Timestamp(value)
    }
}

impl From<NaiveTime> for Value {
    fn from(value: NaiveTime) -> Value {
        Value::Time(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Value {
        Value::Date(value)
    }
}

impl From<Vec<FieldMap>> for Value {
    fn from(occurrences: Vec<FieldMap>) -> Value {
        Value::Groups(occurrences)
    }
}

/// A string-keyed mapping that preserves insertion order.
///
/// Structured messages and group occurrences are instances of this map.
/// `set` replaces an existing entry in place, keeping its original
/// position, so regenerated integrity fields do not shuffle the layout.
#[derive(Clone, Debug, Default)]
pub struct FieldMap {
    entries: Vec<(String, Value)>,
}

impl FieldMap {
    pub fn new() -> FieldMap {
        FieldMap::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        let index = self.entries.iter().position(|(key, _)| key == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }
}

/// Dictionary equality: same key set, same values, insertion order ignored.
/// A factory-built message therefore compares equal to its decoded round
/// trip even though the two were assembled in different orders.
impl PartialEq for FieldMap {
    fn eq(&self, other: &FieldMap) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .all(|(key, value)| other.get(key) == Some(value))
    }
}

impl IntoIterator for FieldMap {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_in_place() {
        let mut map = FieldMap::new();
        map.set("MsgSeqNum", 1);
        map.set("SenderCompID", "A");
        map.set("MsgSeqNum", 2);

        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, ["MsgSeqNum", "SenderCompID"]);
        assert_eq!(map.get("MsgSeqNum"), Some(&Value::Int(2)));
    }

    #[test]
    fn equality_ignores_insertion_order() {
        let mut first = FieldMap::new();
        first.set("A", 1);
        first.set("B", "x");
        let mut second = FieldMap::new();
        second.set("B", "x");
        second.set("A", 1);

        assert_eq!(first, second);

        second.set("A", 2);
        assert_ne!(first, second);
    }

    #[test]
    fn iteration_preserves_insertion_order() {
        let mut map = FieldMap::new();
        map.set("C", 3);
        map.set("A", 1);
        map.set("B", 2);
        let keys: Vec<&str> = map.keys().collect();
        assert_eq!(keys, ["C", "A", "B"]);
    }
}
