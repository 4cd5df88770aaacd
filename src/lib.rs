pub mod config;
pub mod dataset;
pub mod display;
pub mod embedder;
pub mod knn_index;
pub mod serve;
pub mod themes;
pub mod utils;
