use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A compute resource registered with amaretti.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub admins: Vec<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub citation: Option<String>,
    #[serde(default)]
    pub config: Map<String, Value>,
    #[serde(default)]
    pub envs: Map<String, Value>,
    #[serde(default)]
    pub gids: Vec<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub status_msg: Option<String>,
    #[serde(default)]
    pub status_update: Option<String>,
    #[serde(default)]
    pub lastok_date: Option<String>,
    #[serde(default)]
    pub stats: Map<String, Value>,
    #[serde(default)]
    pub create_date: Option<String>,
    #[serde(default)]
    pub update_date: Option<String>,
}

fn default_active() -> bool {
    true
}

/// Answer of `/resource/best`: the chosen resource plus the scoring the
/// service did to pick it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BestResource {
    #[serde(default)]
    pub resource: Option<Resource>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub considered: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resource_defaults_to_active() {
        let resource: Resource = serde_json::from_value(json!({
            "_id": "r1",
            "name": "test resource",
            "envs": {"test": 123},
            "gids": [0, 1, 2],
        }))
        .unwrap();
        assert!(resource.active);
        assert_eq!(resource.envs["test"], json!(123));
        assert_eq!(resource.gids, vec![0, 1, 2]);
    }
}
