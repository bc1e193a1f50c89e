//! Synheart Markers - Digital behavior markers from mobile sensing
//!
//! Markers turns day- and hour-level behavior matrices into a fixed-length
//! marker vector and a weekly change-score series:
//! statistical features → routine regularity → circadian strength, plus a
//! day-permutation change test judged against each subject's own history.
//!
//! ## Modules
//!
//! - **Features**: Moments, crossings, dispersion, spectral and motion descriptors
//! - **Regularity / Circadian**: Routine self-similarity and 24-hour rhythm strength
//! - **Change**: Permutation change detection and the boxplot outlier test
//! - **Pipeline**: Marker aggregation and the stateful per-subject processor

pub mod baseline;
pub mod change;
pub mod circadian;
pub mod config;
pub mod encoder;
pub mod error;
pub mod features;
pub mod normalizer;
pub mod pipeline;
pub mod regularity;
pub mod types;

pub use baseline::ChangeHistory;
pub use change::{ChangeDetector, PermutationSource, SeededPermutations};
pub use circadian::CircadianEngine;
pub use config::{MarkerConfig, PValueMode, QuantileMethod};
pub use error::ComputeError;
pub use features::{generate_statistical_features, StatisticalFeatures};
pub use pipeline::{behavior_markers, compute_change_scores, MarkerProcessor};
pub use regularity::RegularityEngine;
pub use types::{BehaviorMarkers, ChangeScoreRecord, Matrix, MarkerReport, RegularityVector};

/// Markers version embedded in all reports
pub const MARKERS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "synheart-markers";
