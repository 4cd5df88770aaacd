use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashSet;

use crate::dataset::PaperRecord;
use crate::knn_index::Neighbor;

pub const DEFAULT_POINT_SIZE: f64 = 10.0;
pub const HIGHLIGHT_POINT_SIZE: f64 = 16.0;
pub const DIMMED_ALPHA: f64 = 0.5;
pub const HIGHLIGHT_COLOR: &str = "#FFFFFF";

const CATEGORY20: [&str; 20] = [
    "#1f77b4", "#aec7e8", "#ff7f0e", "#ffbb78", "#2ca02c", "#98df8a", "#d62728",
    "#ff9896", "#9467bd", "#c5b0d5", "#8c564b", "#c49c94", "#e377c2", "#f7b6d2",
    "#7f7f7f", "#c7c7c7", "#bcbd22", "#dbdb8d", "#17becf", "#9edae5",
];
const SET1_9: [&str; 9] = [
    "#e41a1c", "#377eb8", "#4daf4a", "#984ea3", "#ff7f00", "#ffff33", "#a65628",
    "#f781bf", "#999999",
];
const SET3_9: [&str; 9] = [
    "#8dd3c7", "#ffffb3", "#bebada", "#fb8072", "#80b1d3", "#fdb462", "#b3de69",
    "#fccde5", "#d9d9d9",
];
const ACCENT8: [&str; 8] = [
    "#7fc97f", "#beaed4", "#fdc086", "#ffff99", "#386cb0", "#f0027f", "#bf5b17",
    "#666666",
];
const PAIRED12: [&str; 12] = [
    "#a6cee3", "#1f78b4", "#b2df8a", "#33a02c", "#fb9a99", "#e31a1c", "#fdbf6f",
    "#ff7f00", "#cab2d6", "#6a3d9a", "#ffff99", "#b15928",
];
const SPECTRAL11: [&str; 11] = [
    "#9e0142", "#d53e4f", "#f46d43", "#fdae61", "#fee08b", "#ffffbf", "#e6f598",
    "#abdda4", "#66c2a5", "#3288bd", "#5e4fa2",
];

/// Concatenation of the Bokeh palettes the dashboard colors clusters with.
/// Cluster ids beyond the palette length wrap around by modulo.
pub static PALETTE: Lazy<Vec<&'static str>> = Lazy::new(|| {
    let mut palette = Vec::new();
    palette.extend_from_slice(&CATEGORY20);
    palette.extend_from_slice(&SET1_9);
    palette.extend_from_slice(&SET3_9);
    palette.extend_from_slice(&ACCENT8);
    palette.extend_from_slice(&PAIRED12);
    palette.extend_from_slice(&SPECTRAL11);
    palette
});

pub fn cluster_color(cluster_id: usize) -> &'static str {
    PALETTE[cluster_id % PALETTE.len()]
}

/// Per-record visual attributes, recomputed in full whenever the query or
/// the cluster count changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayAttributes {
    pub color: String,
    pub size: f64,
    pub alpha: f64,
    pub theme: String,
}

/// Fields shown when a point is selected on the plot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayPanel {
    pub theme: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub url: String,
}

/// Derives the visual attributes for every record. With no search result
/// (or an empty one) each record gets its cluster color at full opacity.
/// With search matches present, matched records are painted the highlight
/// color at full opacity and enlarged, everything else keeps its cluster
/// color but is dimmed. Rank within the result set does not matter.
pub fn attributes_for(
    assignments: &[usize],
    themes: &[String],
    search: Option<&[Neighbor]>,
) -> Vec<DisplayAttributes> {
    let matches: HashSet<usize> = search
        .map(|neighbors| neighbors.iter().map(|n| n.index).collect())
        .unwrap_or_default();
    let searching = !matches.is_empty();

    assignments
        .iter()
        .enumerate()
        .map(|(idx, &cluster)| {
            let theme = themes.get(cluster).cloned().unwrap_or_default();
            if searching && matches.contains(&idx) {
                DisplayAttributes {
                    color: HIGHLIGHT_COLOR.to_string(),
                    size: HIGHLIGHT_POINT_SIZE,
                    alpha: 1.0,
                    theme,
                }
            } else {
                DisplayAttributes {
                    color: cluster_color(cluster).to_string(),
                    size: DEFAULT_POINT_SIZE,
                    alpha: if searching { DIMMED_ALPHA } else { 1.0 },
                    theme,
                }
            }
        })
        .collect()
}

/// The tap-to-inspect callback as a plain function: given the selected
/// record index, returns the fields the side panel shows.
pub fn selection_panel(
    records: &[PaperRecord],
    attributes: &[DisplayAttributes],
    index: usize,
) -> Option<DisplayPanel> {
    let record = records.get(index)?;
    let attr = attributes.get(index)?;
    Some(DisplayPanel {
        theme: attr.theme.clone(),
        title: record.title.clone(),
        abstract_text: record.abstract_text.clone(),
        url: record.url.clone(),
    })
}
