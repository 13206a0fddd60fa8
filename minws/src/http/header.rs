/// Header multimap. Keys are case-sensitive and insertion order is kept,
/// which is also the order headers are written in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    values: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Last value stored under `key`, a repeated header overrides the earlier ones
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.values
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.iter().any(|(k, _)| k == key)
    }

    /// Adds a value without touching existing ones
    pub fn append(&mut self, key: &str, value: String) {
        self.values.push((key.to_owned(), value));
    }

    /// Replaces every value stored under `key`
    pub fn insert(&mut self, key: &str, value: String) {
        self.values.retain(|(k, _)| k != key);
        self.values.push((key.to_owned(), value));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for HeaderMap {
    fn from(value: [(&str, &str); N]) -> Self {
        Self {
            values: value
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v.to_owned()))
                .collect(),
        }
    }
}
