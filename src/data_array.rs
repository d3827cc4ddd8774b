//! An explicit wrapper over row and value sequences.
//!
//! Every operation is a named method that consumes the array. The executor
//! runs SORT, LIMIT, GROUP BY and FLATTEN through it and the list functions
//! (`sort`, `reverse`, `unique`, `nonnull`) share the same combinators.

use std::cmp::Ordering;

use crate::value::Value;

/// An ordered sequence with query-style combinators.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataArray<T = Value> {
    values: Vec<T>,
}

/// One run of equal keys produced by [`DataArray::group_by`].
#[derive(Debug, Clone, PartialEq)]
pub struct Group<T> {
    pub key: Value,
    pub rows: DataArray<T>,
}

impl<T> DataArray<T> {
    pub fn new(values: Vec<T>) -> Self {
        DataArray { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.values.iter()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.values
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> DataArray<U> {
        DataArray::new(self.values.into_iter().map(f).collect())
    }

    pub fn flat_map<U, I>(self, f: impl FnMut(T) -> I) -> DataArray<U>
    where
        I: IntoIterator<Item = U>,
    {
        DataArray::new(self.values.into_iter().flat_map(f).collect())
    }

    /// Keeps elements matching the predicate.
    pub fn filter(self, mut predicate: impl FnMut(&T) -> bool) -> Self {
        DataArray::new(self.values.into_iter().filter(|v| predicate(v)).collect())
    }

    pub fn limit(mut self, count: usize) -> Self {
        self.values.truncate(count);
        self
    }

    pub fn reverse(mut self) -> Self {
        self.values.reverse();
        self
    }

    /// Stable sort by a comparator; equal elements keep their relative order.
    pub fn sort_by(mut self, compare: impl FnMut(&T, &T) -> Ordering) -> Self {
        self.values.sort_by(compare);
        self
    }

    /// Stable-sorts by key, then coalesces adjacent equal keys into groups.
    pub fn group_by(
        self,
        mut key: impl FnMut(&T) -> Value,
        compare: impl Fn(&Value, &Value) -> Ordering,
    ) -> Vec<Group<T>> {
        let mut keyed: Vec<(Value, T)> = self.values.into_iter().map(|v| (key(&v), v)).collect();
        keyed.sort_by(|(a, _), (b, _)| compare(a, b));

        let mut groups: Vec<Group<T>> = Vec::new();
        for (k, v) in keyed {
            match groups.last_mut() {
                Some(group) if compare(&group.key, &k) == Ordering::Equal => group.rows.values.push(v),
                _ => groups.push(Group {
                    key: k,
                    rows: DataArray::new(vec![v]),
                }),
            }
        }
        groups
    }

    /// Drops elements equal (under `compare`) to an earlier element.
    pub fn distinct(self, compare: impl Fn(&T, &T) -> Ordering) -> Self {
        let mut kept: Vec<T> = Vec::new();
        for value in self.values {
            if !kept.iter().any(|k| compare(k, &value) == Ordering::Equal) {
                kept.push(value);
            }
        }
        DataArray::new(kept)
    }
}

impl DataArray<Value> {
    /// Projects `field` out of every element through `get`, one output per
    /// element. Elements `get` rejects are dropped; array results are kept
    /// whole, so splicing them is a separate `flat` call.
    pub fn to(
        self,
        field: &str,
        mut get: impl FnMut(&Value, &str) -> Option<Value>,
    ) -> DataArray<Value> {
        self.values.iter().filter_map(|value| get(value, field)).collect()
    }
}

impl<T> From<Vec<T>> for DataArray<T> {
    fn from(values: Vec<T>) -> Self {
        DataArray::new(values)
    }
}

impl<T> FromIterator<T> for DataArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        DataArray::new(iter.into_iter().collect())
    }
}

/// A data array is an array value.
impl From<DataArray<Value>> for Value {
    fn from(array: DataArray<Value>) -> Self {
        Value::Array(array.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_by_is_stable() {
        let rows = DataArray::new(vec![("b", 1), ("a", 2), ("b", 3), ("a", 4)]);
        let groups = rows.group_by(|(k, _)| Value::from(*k), |a, b| a.compare(b));

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, Value::from("a"));
        let members: Vec<i32> = groups[0].rows.iter().map(|(_, n)| *n).collect();
        assert_eq!(members, vec![2, 4]);
    }

    #[test]
    fn test_flat_map_expands_in_order() {
        let rows = DataArray::new(vec![vec![1, 2], vec![], vec![3]]);
        assert_eq!(rows.flat_map(|v| v).into_vec(), vec![1, 2, 3]);
    }

    #[test]
    fn test_distinct_keeps_first_occurrence() {
        let values: DataArray = vec![Value::from(2.0), Value::from(1.0), Value::from(2.0)].into();
        let unique = values.distinct(|a, b| a.compare(b));
        assert_eq!(Value::from(unique), Value::Array(vec![Value::from(2.0), Value::from(1.0)]));
    }

    #[test]
    fn test_to_projects_without_flattening() {
        let mut tagged = crate::value::Object::new();
        tagged.insert("tags".to_string(), Value::Array(vec!["#a".into(), "#b".into()]));
        let pages = DataArray::new(vec![Value::Object(tagged), Value::from(3.0)]);

        let tags = pages.to("tags", |value, field| {
            value.as_object().and_then(|object| object.get(field)).cloned()
        });
        assert_eq!(
            tags.into_vec(),
            vec![Value::Array(vec!["#a".into(), "#b".into()])]
        );
    }

    #[test]
    fn test_limit_and_filter() {
        let values: DataArray<i32> = (1..=6).collect();
        let even = values.filter(|n| n % 2 == 0).limit(2);
        assert_eq!(even.len(), 2);
        assert_eq!(even.into_vec(), vec![2, 4]);
    }
}
