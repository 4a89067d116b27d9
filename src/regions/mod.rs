//! Region-level analysis of binary masks and label maps.
//!
//! - `labeling`: connected components, per-component statistics.
//! - `distance`: Euclidean / Manhattan / Chebyshev distance transforms.
//! - `watershed`: marker-based priority flood and peak markers.
//! - `superpixel`: SLIC oversegmentation and small-region merging.

pub mod distance;
pub mod labeling;
pub mod superpixel;
pub mod watershed;

pub use distance::{distance_transform, DistanceMetric};
pub use labeling::{
    count_components, label_components, relabel_connected, ComponentStats, Connectivity, Labels,
};
pub use superpixel::{merge_small_regions, region_means, slic, SlicParams};
pub use watershed::{peak_markers, watershed};
