use hnsw_rs::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;

const HNSW_MAX_CONNECTIONS: usize = 16;
const HNSW_NUM_LAYERS: usize = 16;
const HNSW_EF_CONSTRUCTION: usize = 200;
const HNSW_EF_SEARCH: usize = 200;

/// One nearest-neighbor hit: record index plus cosine distance to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub index: usize,
    pub distance: f32,
}

/// Cosine-distance index over the precomputed embedding matrix. The matrix
/// never changes after load, so the index is built exactly once per process
/// and reused for every query.
pub struct KnnIndex {
    hnsw: Hnsw<'static, f32, DistCosine>,
    dim: usize,
    len: usize,
}

impl std::fmt::Debug for KnnIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnnIndex")
            .field("dim", &self.dim)
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

impl KnnIndex {
    pub fn build(vectors: &[Vec<f32>]) -> Result<Self, String> {
        if vectors.is_empty() {
            return Err("Cannot build a neighbor index over zero vectors".to_string());
        }
        let dim = vectors[0].len();
        let hnsw = Hnsw::<f32, DistCosine>::new(
            HNSW_MAX_CONNECTIONS,
            vectors.len(),
            HNSW_NUM_LAYERS,
            HNSW_EF_CONSTRUCTION,
            DistCosine {},
        );

        for (idx, vector) in vectors.iter().enumerate() {
            if vector.len() != dim {
                return Err(format!(
                    "Vector {idx} has dimension {} but vector 0 has {dim}",
                    vector.len()
                ));
            }
            hnsw.insert((vector.as_slice(), idx));
            if idx > 0 && idx % 500 == 0 {
                println!("indexed {idx}/{} embeddings...", vectors.len());
            }
        }

        Ok(Self {
            hnsw,
            dim,
            len: vectors.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Returns the k records closest to the query, ascending by cosine
    /// distance. A k larger than the corpus is clamped to the corpus size.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, String> {
        if query.len() != self.dim {
            return Err(format!(
                "Query embedding has dimension {} but the index holds {}-dimensional vectors",
                query.len(),
                self.dim
            ));
        }
        let k = k.max(1).min(self.len);
        let mut neighbors: Vec<Neighbor> = self
            .hnsw
            .search(query, k, HNSW_EF_SEARCH)
            .into_iter()
            .map(|hit| Neighbor {
                index: hit.d_id,
                distance: hit.distance,
            })
            .collect();
        neighbors.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(Ordering::Equal)
        });
        neighbors.truncate(k);
        Ok(neighbors)
    }
}
