// Input resolution: turn user bindings (`field:dataset_id`) into datasets
// checked against the app's input contract.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;

use crate::error::{Error, ValidationError};
use crate::model::{App, AppInput, DataType, Dataset};

/// One `field:dataset_id` pair supplied by the caller. Multi inputs are
/// bound by repeating the field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputBinding {
    pub field: String,
    pub dataset_id: String,
}

impl InputBinding {
    pub fn new(field: impl Into<String>, dataset_id: impl Into<String>) -> Self {
        InputBinding {
            field: field.into(),
            dataset_id: dataset_id.into(),
        }
    }
}

impl FromStr for InputBinding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.split_once(':') {
            Some((field, id)) if !field.trim().is_empty() && !id.trim().is_empty() => {
                Ok(InputBinding::new(field.trim(), id.trim()))
            }
            _ => Err(ValidationError::Other(format!(
                "input \"{s}\" should look like <field>:<dataset id>"
            ))
            .into()),
        }
    }
}

/// Datasets accepted for each input field, in binding order.
pub type ResolvedInputs = BTreeMap<String, Vec<Dataset>>;

/// Every dataset id referenced by the bindings, once each, sorted.
pub fn unique_dataset_ids(bindings: &[InputBinding]) -> Vec<String> {
    bindings
        .iter()
        .map(|b| b.dataset_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// A tag `!t` must be absent from the dataset, any other tag present.
pub fn check_tags(field: &str, dataset: &Dataset, input: &AppInput) -> Result<(), ValidationError> {
    let present: BTreeSet<String> = dataset.datatype_tags.iter().map(|t| t.to_string()).collect();
    for tag in &input.datatype_tags {
        if tag.negate {
            if present.contains(&tag.name) {
                return Err(ValidationError::ForbiddenTag {
                    field: field.to_string(),
                    id: dataset.id.clone(),
                    tag: tag.name.clone(),
                });
            }
        } else if !present.contains(&tag.name) {
            return Err(ValidationError::MissingTag {
                field: field.to_string(),
                id: dataset.id.clone(),
                tag: tag.name.clone(),
            });
        }
    }
    Ok(())
}

fn datatype_name(datatypes: &HashMap<String, DataType>, id: &str) -> String {
    datatypes
        .get(id)
        .map(|d| d.name.clone())
        .unwrap_or_else(|| id.to_string())
}

/// Check every binding against the fetched datasets and the app's inputs.
pub fn resolve(
    app: &App,
    datatypes: &HashMap<String, DataType>,
    datasets: &HashMap<String, Dataset>,
    bindings: &[InputBinding],
) -> Result<ResolvedInputs, ValidationError> {
    let mut resolved = ResolvedInputs::new();

    for binding in bindings {
        let field = binding.field.as_str();
        let id = binding.dataset_id.as_str();

        let dataset = datasets
            .get(id)
            .ok_or_else(|| ValidationError::DatasetNotFound { id: id.to_string() })?;

        if !dataset.is_stored() {
            return Err(ValidationError::NotStored {
                field: field.to_string(),
                id: id.to_string(),
                status: dataset.status.clone(),
            });
        }
        if dataset.removed {
            return Err(ValidationError::Removed {
                field: field.to_string(),
                id: id.to_string(),
            });
        }

        let input = app
            .input(field)
            .ok_or_else(|| ValidationError::UnknownInput {
                field: field.to_string(),
            })?;

        if dataset.datatype != input.datatype {
            return Err(ValidationError::DatatypeMismatch {
                field: field.to_string(),
                id: id.to_string(),
                given: datatype_name(datatypes, dataset.datatype.as_str()),
                expected: datatype_name(datatypes, input.datatype.as_str()),
            });
        }

        check_tags(field, dataset, input)?;

        let slot = resolved.entry(field.to_string()).or_default();
        if !input.multi && !slot.is_empty() {
            return Err(ValidationError::Other(format!(
                "input \"{field}\" takes a single data object but was given several"
            )));
        }
        slot.push(dataset.clone());
    }

    Ok(resolved)
}

/// All non-optional inputs must have been bound; report every one that
/// was not.
pub fn check_missing(app: &App, resolved: &ResolvedInputs) -> Result<(), ValidationError> {
    let missing: Vec<String> = app
        .inputs
        .iter()
        .filter(|input| !input.optional && !resolved.contains_key(&input.field))
        .map(|input| input.field.clone())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingInputs(missing))
    }
}
