//! Ordered name/value mapping returned by reads.

use std::collections::BTreeMap;

/// Values keyed by name, in the order they were requested.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation(Vec<(String, f64)>);

impl Observation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite `name`, keeping its first position.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| *v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_map(&self) -> BTreeMap<String, f64> {
        self.0.iter().cloned().collect()
    }
}

impl FromIterator<(String, f64)> for Observation {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        let mut obs = Observation::new();
        for (name, value) in iter {
            obs.insert(name, value);
        }
        obs
    }
}

impl IntoIterator for Observation {
    type Item = (String, f64);
    type IntoIter = std::vec::IntoIter<(String, f64)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
