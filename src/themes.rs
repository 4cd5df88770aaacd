use serde_json::{Map, Value};
use serde_pickle::de::DeOptions;
use serde_pickle::value::{HashableValue, Value as PickleValue};
use std::fs;
use std::path::{Path, PathBuf};

/// Cluster counts with precomputed theme artifacts. Clustering happens
/// upstream; at runtime we only deserialize, so any other K is rejected.
pub const SUPPORTED_CLUSTER_COUNTS: [usize; 10] =
    [10, 20, 30, 40, 50, 60, 70, 80, 90, 100];

/// Per-K theme artifact: one theme string per cluster and one cluster id per
/// record, in dataset row order.
#[derive(Debug, Clone)]
pub struct ClusterThemes {
    pub themes: Vec<String>,
    pub assignments: Vec<usize>,
}

impl ClusterThemes {
    pub fn validate_record_count(&self, n_records: usize) -> Result<(), String> {
        if self.assignments.len() != n_records {
            return Err(format!(
                "Cluster assignment count {} does not match record count {n_records}",
                self.assignments.len()
            ));
        }
        Ok(())
    }
}

pub fn is_supported_cluster_count(k: usize) -> bool {
    SUPPORTED_CLUSTER_COUNTS.contains(&k)
}

pub fn artifact_path(dir: &Path, k: usize) -> PathBuf {
    dir.join(format!("cluster_themes_{k}"))
}

fn artifact_json_path(dir: &Path, k: usize) -> PathBuf {
    dir.join(format!("cluster_themes_{k}.json"))
}

pub fn available_cluster_counts(dir: &Path) -> Vec<usize> {
    SUPPORTED_CLUSTER_COUNTS
        .iter()
        .copied()
        .filter(|&k| artifact_path(dir, k).exists() || artifact_json_path(dir, k).exists())
        .collect()
}

pub fn load_cluster_themes(dir: &Path, k: usize) -> Result<ClusterThemes, String> {
    if !is_supported_cluster_count(k) {
        return Err(format!(
            "Unsupported cluster count {k}; expected one of {SUPPORTED_CLUSTER_COUNTS:?}"
        ));
    }
    let pickle_path = artifact_path(dir, k);
    let json_path = artifact_json_path(dir, k);

    let value = if pickle_path.exists() {
        let bytes = fs::read(&pickle_path)
            .map_err(|err| format!("Failed to read {}: {err}", pickle_path.display()))?;
        let value: PickleValue = serde_pickle::from_slice(&bytes, DeOptions::default())
            .map_err(|err| format!("Failed to decode {}: {err}", pickle_path.display()))?;
        pickle_to_json(value)
    } else if json_path.exists() {
        let bytes = fs::read(&json_path)
            .map_err(|err| format!("Failed to read {}: {err}", json_path.display()))?;
        serde_json::from_slice(&bytes)
            .map_err(|err| format!("Failed to decode {}: {err}", json_path.display()))?
    } else {
        return Err(format!(
            "No cluster theme artifact for K={k}: neither {} nor {} exists",
            pickle_path.display(),
            json_path.display()
        ));
    };

    parse_theme_artifact(value)
}

/// The pickle artifact is a `(themes, cluster_indices)` tuple where `themes`
/// is either a list or an int-keyed dict. The JSON fallback mirrors that
/// tuple as a two-element array, or spells the fields out as an object.
fn parse_theme_artifact(value: Value) -> Result<ClusterThemes, String> {
    let (themes_value, assignments_value) = match value {
        Value::Array(items) => match <[Value; 2]>::try_from(items) {
            Ok([themes, assignments]) => (themes, assignments),
            Err(items) => {
                return Err(format!(
                    "Theme artifact tuple has {} entries, expected 2",
                    items.len()
                ))
            }
        },
        Value::Object(mut map) => {
            let themes = map
                .remove("themes")
                .ok_or("Theme artifact object is missing \"themes\"")?;
            let assignments = map
                .remove("assignments")
                .ok_or("Theme artifact object is missing \"assignments\"")?;
            (themes, assignments)
        }
        other => {
            return Err(format!(
                "Unexpected theme artifact layout: expected tuple or object, got {other}"
            ))
        }
    };

    let themes = parse_themes(themes_value)?;
    let assignments = parse_assignments(assignments_value)?;
    for (idx, &cluster) in assignments.iter().enumerate() {
        if cluster >= themes.len() {
            return Err(format!(
                "Record {idx} is assigned to cluster {cluster} but only {} themes exist",
                themes.len()
            ));
        }
    }
    Ok(ClusterThemes {
        themes,
        assignments,
    })
}

fn parse_themes(value: Value) -> Result<Vec<String>, String> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| match item {
                Value::String(theme) => Ok(theme),
                other => Err(format!("Theme {idx} is not a string: {other}")),
            })
            .collect(),
        Value::Object(map) => {
            let mut themes = vec![None; map.len()];
            for (key, item) in map {
                let cluster: usize = key
                    .parse()
                    .map_err(|_| format!("Theme map key {key:?} is not a cluster id"))?;
                let theme = match item {
                    Value::String(theme) => theme,
                    other => return Err(format!("Theme for cluster {cluster} is not a string: {other}")),
                };
                if cluster >= themes.len() {
                    return Err(format!(
                        "Theme map keys must cover 0..{}, found {cluster}",
                        themes.len()
                    ));
                }
                themes[cluster] = Some(theme);
            }
            themes
                .into_iter()
                .enumerate()
                .map(|(cluster, theme)| {
                    theme.ok_or(format!("Theme map has no entry for cluster {cluster}"))
                })
                .collect()
        }
        other => Err(format!("Unexpected themes layout: {other}")),
    }
}

fn parse_assignments(value: Value) -> Result<Vec<usize>, String> {
    let items = match value {
        Value::Array(items) => items,
        other => return Err(format!("Unexpected assignments layout: {other}")),
    };
    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            item.as_u64()
                .map(|v| v as usize)
                .ok_or(format!("Assignment {idx} is not a non-negative integer: {item}"))
        })
        .collect()
}

fn pickle_to_json(value: PickleValue) -> Value {
    match value {
        PickleValue::None => Value::Null,
        PickleValue::Bool(v) => Value::Bool(v),
        PickleValue::I64(v) => Value::Number(v.into()),
        PickleValue::F64(v) => serde_json::Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        PickleValue::String(v) => Value::String(v),
        PickleValue::List(items) | PickleValue::Tuple(items) => {
            Value::Array(items.into_iter().map(pickle_to_json).collect())
        }
        PickleValue::Dict(map) => {
            let mut out = Map::new();
            for (key, item) in map {
                out.insert(hashable_key_to_string(&key), pickle_to_json(item));
            }
            Value::Object(out)
        }
        other => Value::String(format!("{other:?}")),
    }
}

fn hashable_key_to_string(key: &HashableValue) -> String {
    match key {
        HashableValue::String(v) => v.clone(),
        HashableValue::I64(v) => v.to_string(),
        HashableValue::Bool(v) => v.to_string(),
        other => format!("{other:?}"),
    }
}
