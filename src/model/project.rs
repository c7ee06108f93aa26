use serde::{Deserialize, Serialize};

/// A warehouse project. Datasets live in a project and tasks run under the
/// project's group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "desc", default)]
    pub description: Option<String>,
    #[serde(rename = "group_id")]
    pub group: i64,
    #[serde(default)]
    pub admins: Vec<String>,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub guests: Vec<String>,
    #[serde(default)]
    pub access: Option<String>,
    #[serde(default)]
    pub removed: bool,
    #[serde(rename = "noPublicResource", default)]
    pub no_public_resource: bool,
}

impl Project {
    /// Whether tasks for this project may also be scheduled on the shared
    /// public resources.
    pub fn has_public_resource(&self) -> bool {
        !self.no_public_resource
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn maps_warehouse_document() {
        let project: Project = serde_json::from_value(json!({
            "_id": "65b022f04ce5ac2907f7d4a1",
            "name": "test",
            "desc": "test project",
            "group_id": 17519,
            "admins": ["1"],
            "members": ["1", "2"],
            "guests": [],
            "access": "private",
        }))
        .unwrap();
        assert_eq!(project.id, "65b022f04ce5ac2907f7d4a1");
        assert_eq!(project.group, 17519);
        assert_eq!(project.description.as_deref(), Some("test project"));
        assert!(!project.removed);
        assert!(project.has_public_resource());
    }

    #[test]
    fn public_resources_can_be_disabled() {
        let project: Project = serde_json::from_value(json!({
            "_id": "p",
            "name": "n",
            "group_id": 1,
            "noPublicResource": true,
        }))
        .unwrap();
        assert!(!project.has_public_resource());
    }
}
