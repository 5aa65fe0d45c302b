use std::collections::HashMap;

use crate::value::Value;

/// Hash index over one PRIMARY KEY or UNIQUE column: value → row position.
///
/// `NULL` is never indexed, so any number of rows may hold `NULL` in a
/// UNIQUE column.
#[derive(Debug, Clone, Default)]
pub struct HashIndex {
    entries: HashMap<Value, usize>,
}

impl HashIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Position of the row holding `value`, if any.
    pub fn get(&self, value: &Value) -> Option<usize> {
        if value.is_null() {
            return None;
        }
        self.entries.get(value).copied()
    }

    pub fn contains(&self, value: &Value) -> bool {
        self.get(value).is_some()
    }

    pub fn insert(&mut self, value: Value, row_idx: usize) {
        if !value.is_null() {
            self.entries.insert(value, row_idx);
        }
    }

    pub fn remove(&mut self, value: &Value) {
        self.entries.remove(value);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let mut index = HashIndex::new();
        index.insert(Value::Int(7), 0);
        index.insert(Value::from("x"), 3);

        assert_eq!(index.get(&Value::Int(7)), Some(0));
        assert_eq!(index.get(&Value::from("x")), Some(3));
        assert!(!index.contains(&Value::Int(8)));

        index.remove(&Value::Int(7));
        assert!(!index.contains(&Value::Int(7)));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_null_is_never_indexed() {
        let mut index = HashIndex::new();
        index.insert(Value::Null, 0);
        index.insert(Value::Null, 1);

        assert!(index.is_empty());
        assert_eq!(index.get(&Value::Null), None);
    }
}
