// Query parameters for the list endpoints: `find=<json>&sort=&skip=&limit=`
// where `find` is a MongoDB style filter document.

use serde_json::{json, Map, Value};

use crate::model::DataTypeTag;

pub const DEFAULT_LIMIT: u32 = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct Find {
    pub filter: Map<String, Value>,
    pub sort: Option<String>,
    pub skip: u32,
    pub limit: u32,
}

impl Default for Find {
    fn default() -> Self {
        Find {
            filter: Map::new(),
            sort: None,
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Find {
    pub fn new() -> Self {
        Find::default()
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.filter.insert(key.to_string(), value.into());
        self
    }

    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.filter.insert(key.to_string(), value.into());
    }

    pub fn sort(mut self, field: &str) -> Self {
        self.sort = Some(field.to_string());
        self
    }

    pub fn page(mut self, skip: Option<u32>, limit: Option<u32>) -> Self {
        self.skip = skip.unwrap_or(0);
        self.limit = limit.unwrap_or(DEFAULT_LIMIT);
        self
    }

    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("find", Value::Object(self.filter.clone()).to_string())];
        if let Some(sort) = &self.sort {
            params.push(("sort", sort.clone()));
        }
        params.push(("skip", self.skip.to_string()));
        params.push(("limit", self.limit.to_string()));
        params
    }
}

/// Whether `value` looks like a document id (24 hex digits).
pub fn is_id(value: &str) -> bool {
    value.len() == 24 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Case-insensitive substring match.
pub fn regex(pattern: &str) -> Value {
    json!({"$regex": pattern, "$options": "ig"})
}

pub fn any_of<S: AsRef<str>>(ids: &[S]) -> Value {
    json!({"$in": ids.iter().map(AsRef::as_ref).collect::<Vec<_>>()})
}

/// `$all` for plain tags and `$nin` for negated ones; `None` when there is
/// nothing to filter on.
pub fn tag_filter(tags: &[DataTypeTag]) -> Option<Value> {
    let (neg, pos): (Vec<&DataTypeTag>, Vec<&DataTypeTag>) = tags.iter().partition(|t| t.negate);
    let mut filter = Map::new();
    if !pos.is_empty() {
        filter.insert("$all".into(), json!(pos.iter().map(|t| &t.name).collect::<Vec<_>>()));
    }
    if !neg.is_empty() {
        filter.insert("$nin".into(), json!(neg.iter().map(|t| &t.name).collect::<Vec<_>>()));
    }
    (!filter.is_empty()).then_some(Value::Object(filter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognises_ids() {
        assert!(is_id("65b022f04ce5ac2907f7d4a1"));
        assert!(!is_id("65b022f04ce5ac2907f7d4a"));
        assert!(!is_id("neuro/anat/t1w-xxxxxxxxxx"));
    }

    #[test]
    fn params_carry_filter_and_paging() {
        let find = Find::new().with("name", "test").sort("name").page(Some(10), None);
        let params = find.to_params();
        assert_eq!(params[0], ("find", r#"{"name":"test"}"#.to_string()));
        assert_eq!(params[1], ("sort", "name".to_string()));
        assert_eq!(params[2], ("skip", "10".to_string()));
        assert_eq!(params[3], ("limit", "100".to_string()));
    }

    #[test]
    fn tag_filter_splits_negations() {
        let tags = vec![
            DataTypeTag::new("defaced"),
            DataTypeTag::negated("acpc_aligned"),
        ];
        assert_eq!(
            tag_filter(&tags),
            Some(json!({"$all": ["defaced"], "$nin": ["acpc_aligned"]}))
        );
        assert_eq!(tag_filter(&[]), None);
    }
}
