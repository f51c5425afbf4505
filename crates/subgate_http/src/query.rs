use std::collections::HashMap;

use url::Url;

/// Decoded query parameters. For a repeated parameter the first value
/// wins, so `?token=a&token=b` authenticates with `a`.
#[derive(Debug, Default)]
pub struct QueryParams {
    values: HashMap<String, String>,
}

impl QueryParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut values = HashMap::new();
        for (name, value) in pairs {
            values.entry(name.into()).or_insert_with(|| value.into());
        }
        Self { values }
    }
}

/// Split a request target into its path and decoded query parameters.
/// Returns `None` when the target cannot be interpreted as a path.
pub fn parse_target(target: &str) -> Option<(String, QueryParams)> {
    if !target.starts_with('/') {
        return None;
    }

    // Url only parses absolute URLs; anchor the origin-form target to a
    // fixed dummy base so percent-decoding follows the standard rules.
    let parsed = Url::parse(&format!("http://gateway{target}")).ok()?;

    let params = QueryParams::from_pairs(
        parsed
            .query_pairs()
            .map(|(name, value)| (name.into_owned(), value.into_owned())),
    );

    Some((parsed.path().to_string(), params))
}
