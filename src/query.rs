//! Query-string parsing and typed parameter readers.

use crate::validator::Validator;

/// A parsed `application/x-www-form-urlencoded` query string.
///
/// Keeps every value for a repeated key, in order of appearance.
#[derive(Debug, Default, Clone)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    pub fn parse(raw: &str) -> Self {
        let pairs = raw
            .split('&')
            .filter(|s| !s.is_empty())
            .map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                (decode(k), decode(v))
            })
            .collect();
        Self { pairs }
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        self.pairs.retain(|(k, _)| *k != key);
        self.pairs.push((key, value.into()));
    }

    /// Value for `key`, or `default` when absent or empty.
    pub fn read_string(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Some(v) if !v.is_empty() => v.to_owned(),
            _ => default.to_owned(),
        }
    }

    /// Comma-separated values for `key`, or `default` when absent or empty.
    pub fn read_csv(&self, key: &str, default: &[&str]) -> Vec<String> {
        match self.get(key) {
            Some(v) if !v.is_empty() => v.split(',').map(str::to_owned).collect(),
            _ => default.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    /// Integer value for `key`, or `default` when absent or empty.
    ///
    /// A value that is not an integer records an error against `key` in `v`
    /// and also yields `default`.
    pub fn read_int(&self, key: &str, default: i64, v: &mut Validator) -> i64 {
        match self.get(key) {
            Some(s) if !s.is_empty() => s.parse().unwrap_or_else(|_| {
                v.add_error(key, "must be an integer value");
                default
            }),
            _ => default,
        }
    }
}

/// Percent-decodes one component, treating `+` as a space. Malformed escapes
/// are kept literally.
fn decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                match (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 2;
                    }
                    _ => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}
