use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A named schema for the files a dataset of this type contains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataType {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "desc", default)]
    pub description: Option<String>,
    #[serde(default)]
    pub files: Vec<DataTypeFile>,
    #[serde(default)]
    pub validator: Option<String>,
}

impl DataType {
    /// Look up a datatype file by its field id (e.g. `t1`).
    pub fn file(&self, field: &str) -> Option<&DataTypeFile> {
        self.files.iter().find(|f| f.field == field)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Directory,
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileKind::File => f.write_str("file"),
            FileKind::Directory => f.write_str("directory"),
        }
    }
}

/// One file or directory a datatype declares. On the wire the name is
/// carried as either `filename` or `dirname`, which also decides the kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawDataTypeFile")]
pub struct DataTypeFile {
    pub id: Option<String>,
    pub field: String,
    pub name: String,
    pub kind: FileKind,
    pub required: bool,
    pub ext: Option<String>,
}

#[derive(Deserialize)]
struct RawDataTypeFile {
    #[serde(rename = "_id", default)]
    oid: Option<String>,
    id: String,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    dirname: Option<String>,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    ext: Option<String>,
}

impl From<RawDataTypeFile> for DataTypeFile {
    fn from(raw: RawDataTypeFile) -> Self {
        let (name, kind) = match (raw.dirname, raw.filename) {
            (Some(dir), _) => (dir, FileKind::Directory),
            (None, Some(file)) => (file, FileKind::File),
            (None, None) => (raw.id.clone(), FileKind::File),
        };
        DataTypeFile {
            id: raw.oid,
            field: raw.id,
            name,
            kind,
            required: raw.required,
            ext: raw.ext,
        }
    }
}

/// A datatype tag, possibly negated. The textual form is `name` or
/// `!name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct DataTypeTag {
    pub name: String,
    pub negate: bool,
}

impl DataTypeTag {
    pub fn new(name: impl Into<String>) -> Self {
        DataTypeTag {
            name: name.into(),
            negate: false,
        }
    }

    pub fn negated(name: impl Into<String>) -> Self {
        DataTypeTag {
            name: name.into(),
            negate: true,
        }
    }
}

impl From<&str> for DataTypeTag {
    fn from(s: &str) -> Self {
        let s = s.trim();
        match s.strip_prefix('!') {
            Some(name) => DataTypeTag::negated(name),
            None => DataTypeTag::new(s),
        }
    }
}

impl From<String> for DataTypeTag {
    fn from(s: String) -> Self {
        DataTypeTag::from(s.as_str())
    }
}

impl FromStr for DataTypeTag {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(DataTypeTag::from(s))
    }
}

impl From<DataTypeTag> for String {
    fn from(tag: DataTypeTag) -> Self {
        tag.to_string()
    }
}

impl fmt::Display for DataTypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negate {
            f.write_str("!")?;
        }
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_kind_follows_wire_name() {
        let datatype: DataType = serde_json::from_value(json!({
            "_id": "58c33bcee13a50849b25879a",
            "name": "neuro/anat/t1w",
            "desc": "T1 weighted",
            "files": [
                {"_id": "f1", "id": "t1", "filename": "t1.nii.gz", "required": true, "ext": ".nii.gz"},
                {"id": "output", "dirname": "output", "required": false},
            ],
        }))
        .unwrap();

        let t1 = datatype.file("t1").unwrap();
        assert_eq!(t1.name, "t1.nii.gz");
        assert_eq!(t1.kind, FileKind::File);
        assert!(t1.required);
        assert_eq!(t1.id.as_deref(), Some("f1"));

        let output = datatype.file("output").unwrap();
        assert_eq!(output.kind, FileKind::Directory);
        assert!(datatype.file("missing").is_none());
    }

    #[test]
    fn tag_negation_is_textual() {
        let tag: DataTypeTag = "!acpc_aligned".parse().unwrap();
        assert!(tag.negate);
        assert_eq!(tag.name, "acpc_aligned");
        assert_eq!(tag.to_string(), "!acpc_aligned");

        let tags: Vec<DataTypeTag> = serde_json::from_value(json!(["defaced", "!preprocessed"])).unwrap();
        assert_eq!(tags[0], DataTypeTag::new("defaced"));
        assert_eq!(tags[1], DataTypeTag::negated("preprocessed"));
        assert_eq!(
            serde_json::to_value(&tags).unwrap(),
            json!(["defaced", "!preprocessed"])
        );
    }
}
