// Dataset upload
// --------------
// Local files are packed into a gzipped tarball laid out the way the
// datatype names them, pushed into the working directory of a no-op task
// and then registered with the warehouse, which archives them as a new
// dataset (optionally after running the datatype's validator).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::api::{ApiClient, InstanceQuery, NewInstance};
use crate::error::{Result, ValidationError};
use crate::model::{DataType, Dataset, FileKind, Instance, Project};
use crate::wait::{wait_datasets, wait_task, WaitOptions};

pub const NOOP_SERVICE: &str = "brainlife/app-noop";
/// Where the tarball is unpacked inside the upload task.
pub const UPLOAD_SUBDIR: &str = "upload";

/// Everything needed to register one dataset.
#[derive(Debug, Clone)]
pub struct Upload {
    pub project: Project,
    pub datatype: DataType,
    /// Local path per datatype file id.
    pub files: BTreeMap<String, PathBuf>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub datatype_tags: Vec<String>,
    pub meta: Map<String, Value>,
}

/// Pack `files` into a `.tar.gz`, each entry named after its datatype
/// file (directories recursively).
pub fn build_tarball(datatype: &DataType, files: &BTreeMap<String, PathBuf>) -> Result<Vec<u8>> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));

    for field in files.keys() {
        if datatype.file(field).is_none() {
            return Err(ValidationError::Other(format!("datatype {} has no file \"{field}\"", datatype.name)).into());
        }
    }

    for file in &datatype.files {
        let Some(path) = files.get(&file.field) else {
            continue;
        };
        match file.kind {
            FileKind::Directory => {
                if !path.is_dir() {
                    return Err(ValidationError::Other(format!(
                        "{} is not a directory: {}",
                        file.field,
                        path.display()
                    ))
                    .into());
                }
                builder.append_dir_all(&file.name, path)?;
            }
            FileKind::File => {
                if !path.is_file() {
                    return Err(
                        ValidationError::Other(format!("{} is not a file: {}", file.field, path.display())).into(),
                    );
                }
                builder.append_path_with_name(path, &file.name)?;
            }
        }
        debug!(field = %file.field, name = %file.name, "packed");
    }

    Ok(builder.into_inner()?.finish()?)
}

/// Match `--<file-id> <path>` (or `--<file-id>=<path>`) pairs against the
/// datatype's files. Every required file must be given.
pub fn parse_file_args(datatype: &DataType, args: &[String]) -> Result<BTreeMap<String, PathBuf>> {
    let mut files = BTreeMap::new();
    let mut rest = args.iter();
    while let Some(arg) = rest.next() {
        let Some(flag) = arg.strip_prefix("--") else {
            return Err(ValidationError::Other(format!("unexpected argument \"{arg}\"")).into());
        };
        let (field, path) = match flag.split_once('=') {
            Some((field, path)) => (field, path.to_string()),
            None => {
                let path = rest
                    .next()
                    .ok_or_else(|| ValidationError::Other(format!("--{flag} needs a path")))?;
                (flag, path.clone())
            }
        };
        if datatype.file(field).is_none() {
            let known: Vec<&str> = datatype.files.iter().map(|f| f.field.as_str()).collect();
            return Err(ValidationError::Other(format!(
                "datatype {} has no file \"{field}\" (expected one of: {})",
                datatype.name,
                known.join(", ")
            ))
            .into());
        }
        files.insert(field.to_string(), PathBuf::from(path));
    }

    let missing: Vec<String> = datatype
        .files
        .iter()
        .filter(|f| f.required && !files.contains_key(&f.field))
        .map(|f| format!("--{}", f.field))
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::Other(format!("missing required files: {}", missing.join(", "))).into());
    }
    Ok(files)
}

/// Dataset metadata from an optional JSON sidecar plus the explicit
/// subject/session/run, which win over the sidecar.
pub fn upload_metadata(
    sidecar: Option<&Path>,
    subject: &str,
    session: Option<&str>,
    run: Option<&str>,
) -> Result<Map<String, Value>> {
    let mut meta = match sidecar {
        Some(path) => match serde_json::from_str::<Value>(&fs::read_to_string(path)?)? {
            Value::Object(map) => map,
            _ => {
                return Err(
                    ValidationError::Other(format!("{} does not hold a JSON object", path.display())).into(),
                )
            }
        },
        None => Map::new(),
    };
    meta.insert("subject".into(), Value::from(subject));
    if let Some(session) = session {
        meta.insert("session".into(), Value::from(session));
    }
    if let Some(run) = run {
        meta.insert("run".into(), Value::from(run));
    }
    Ok(meta)
}

fn upload_instance(api: &ApiClient, project: &Project) -> Result<Instance> {
    let name = format!("upload.{}", project.group);
    let existing = api
        .query_instances(&InstanceQuery {
            name: Some(name.clone()),
            ..Default::default()
        })?
        .into_iter()
        .find(|i| i.name.as_deref() == Some(name.as_str()));
    match existing {
        Some(instance) => Ok(instance),
        None => api.create_instance(&NewInstance::for_group(name, None, project.group)),
    }
}

/// Upload and archive one dataset. Returns the archived datasets once
/// stored.
pub fn upload_dataset(api: &ApiClient, upload: &Upload, opts: &WaitOptions) -> Result<Vec<Dataset>> {
    let tarball = build_tarball(&upload.datatype, &upload.files)?;

    let instance = upload_instance(api, &upload.project)?;
    let name = instance.name.clone().unwrap_or_else(|| format!("upload.{}", upload.project.group));
    let task = api.run_task(&instance.id, &name, NOOP_SERVICE, json!({}))?;
    wait_task(api, &task.id, opts)?;

    info!(task = %task.id, bytes = tarball.len(), "uploading files");
    api.upload_to_task(&task.id, &format!("{UPLOAD_SUBDIR}/upload.tar.gz"), tarball)?;

    let fileids: Vec<&String> = upload.files.keys().collect();
    let finalized = api.finalize_upload(&json!({
        "task": task.id,
        "datatype": upload.datatype.id,
        "subdir": UPLOAD_SUBDIR,
        "fileids": fileids,
        "datatype_tags": upload.datatype_tags,
        "meta": upload.meta,
        "tags": upload.tags,
        "desc": upload.description,
    }))?;

    match finalized.pointer("/validator_task/_id").and_then(Value::as_str) {
        Some(validator) => {
            info!(task = %validator, "waiting for validator");
            wait_task(api, validator, opts)
        }
        None => wait_datasets(api, &task.id, opts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::collections::BTreeSet;

    fn datatype() -> DataType {
        serde_json::from_value(json!({
            "_id": "dt",
            "name": "neuro/dwi",
            "files": [
                {"id": "dwi", "filename": "dwi.nii.gz", "required": true},
                {"id": "bvals", "filename": "dwi.bvals", "required": true},
                {"id": "extra", "dirname": "extra"},
            ],
        }))
        .unwrap()
    }

    fn entries(tarball: &[u8]) -> BTreeSet<String> {
        let mut archive = tar::Archive::new(GzDecoder::new(tarball));
        archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().trim_end_matches('/').to_string())
            .collect()
    }

    #[test]
    fn tarball_uses_datatype_names() {
        let dir = tempfile::tempdir().unwrap();
        let dwi = dir.path().join("sub-01_dwi.nii.gz");
        let bvals = dir.path().join("sub-01.bval");
        let extra = dir.path().join("figures");
        fs::write(&dwi, b"nifti").unwrap();
        fs::write(&bvals, b"0 1000").unwrap();
        fs::create_dir(&extra).unwrap();
        fs::write(extra.join("qa.png"), b"png").unwrap();

        let files = BTreeMap::from([
            ("dwi".to_string(), dwi),
            ("bvals".to_string(), bvals),
            ("extra".to_string(), extra),
        ]);
        let names = entries(&build_tarball(&datatype(), &files).unwrap());
        assert!(names.contains("dwi.nii.gz"));
        assert!(names.contains("dwi.bvals"));
        assert!(names.contains("extra/qa.png"));
        assert!(!names.iter().any(|n| n.contains("sub-01")));
    }

    #[test]
    fn tarball_checks_file_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let files = BTreeMap::from([("dwi".to_string(), dir.path().to_path_buf())]);
        let err = build_tarball(&datatype(), &files).unwrap_err();
        assert!(err.to_string().contains("dwi is not a file"));

        let file = dir.path().join("x");
        fs::write(&file, b"x").unwrap();
        let files = BTreeMap::from([("extra".to_string(), file)]);
        let err = build_tarball(&datatype(), &files).unwrap_err();
        assert!(err.to_string().contains("extra is not a directory"));
    }

    #[test]
    fn file_args_match_datatype() {
        let args: Vec<String> = ["--dwi", "a.nii.gz", "--bvals=a.bval"].iter().map(|s| s.to_string()).collect();
        let files = parse_file_args(&datatype(), &args).unwrap();
        assert_eq!(files["dwi"], PathBuf::from("a.nii.gz"));
        assert_eq!(files["bvals"], PathBuf::from("a.bval"));

        let args = vec!["--dwi".to_string(), "a.nii.gz".to_string()];
        let err = parse_file_args(&datatype(), &args).unwrap_err();
        assert!(err.to_string().contains("--bvals"));

        let args = vec!["--t1".to_string(), "t1.nii.gz".to_string()];
        let err = parse_file_args(&datatype(), &args).unwrap_err();
        assert!(err.to_string().contains("no file \"t1\""));
    }

    #[test]
    fn explicit_metadata_overrides_sidecar() {
        let dir = tempfile::tempdir().unwrap();
        let sidecar = dir.path().join("meta.json");
        fs::write(&sidecar, r#"{"subject": "old", "age": 30}"#).unwrap();
        let meta = upload_metadata(Some(&sidecar), "01", Some("pre"), None).unwrap();
        assert_eq!(Value::Object(meta), json!({"subject": "01", "session": "pre", "age": 30}));
    }
}
