use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One paper from the dataset artifact. The row position in the CSV is the
/// record index; every other artifact (embeddings, cluster assignments) is
/// ordered by that same index.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PaperRecord {
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Abstract")]
    pub abstract_text: String,
    #[serde(rename = "URL")]
    pub url: String,
    #[serde(rename = "X")]
    pub x: f64,
    #[serde(rename = "Y")]
    pub y: f64,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub records: Vec<PaperRecord>,
    pub embeddings: Vec<Vec<f32>>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn embedding_dim(&self) -> usize {
        self.embeddings.first().map(Vec::len).unwrap_or(0)
    }
}

pub fn load_records(path: &Path) -> Result<Vec<PaperRecord>, String> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|err| format!("Failed to open dataset {}: {err}", path.display()))?;
    let mut records = Vec::new();
    for (idx, row) in reader.deserialize().enumerate() {
        let record: PaperRecord =
            row.map_err(|err| format!("Failed to parse dataset row {}: {err}", idx + 1))?;
        records.push(record);
    }
    if records.is_empty() {
        return Err(format!("Dataset {} contains no rows", path.display()));
    }
    Ok(records)
}

pub fn load_embeddings(bin_path: &Path, json_path: &Path) -> Result<Vec<Vec<f32>>, String> {
    let vectors: Vec<Vec<f32>> = if bin_path.exists() {
        let bytes = fs::read(bin_path)
            .map_err(|err| format!("Failed to read {}: {err}", bin_path.display()))?;
        let vectors = bincode::deserialize(&bytes)
            .map_err(|err| format!("Failed to decode {}: {err}", bin_path.display()))?;
        println!("loaded embeddings from {}", bin_path.display());
        vectors
    } else if json_path.exists() {
        let bytes = fs::read(json_path)
            .map_err(|err| format!("Failed to read {}: {err}", json_path.display()))?;
        let vectors = serde_json::from_slice(&bytes)
            .map_err(|err| format!("Failed to decode {}: {err}", json_path.display()))?;
        println!("loaded embeddings from JSON {}", json_path.display());
        vectors
    } else {
        return Err(format!(
            "Missing embedding artifact: neither {} nor {} exists",
            bin_path.display(),
            json_path.display()
        ));
    };

    if vectors.is_empty() {
        return Err("Embedding artifact contains no vectors".to_string());
    }
    let dim = vectors[0].len();
    if dim == 0 {
        return Err("Embedding artifact contains zero-length vectors".to_string());
    }
    for (idx, vector) in vectors.iter().enumerate() {
        if vector.len() != dim {
            return Err(format!(
                "Embedding row {idx} has dimension {} but row 0 has {dim}",
                vector.len()
            ));
        }
    }
    Ok(vectors)
}

pub fn load_dataset(
    csv_path: &Path,
    embeddings_path: &Path,
    embeddings_json_path: &Path,
) -> Result<Dataset, String> {
    let records = load_records(csv_path)?;
    let embeddings = load_embeddings(embeddings_path, embeddings_json_path)?;
    if embeddings.len() != records.len() {
        return Err(format!(
            "Embedding count {} does not match record count {}",
            embeddings.len(),
            records.len()
        ));
    }
    Ok(Dataset {
        records,
        embeddings,
    })
}
