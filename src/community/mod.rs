//! Community detection and the community hierarchy

pub mod cluster;
pub mod detect;
pub mod tree;

pub use cluster::SeededLabelPropagation;
pub use detect::CommunityDetector;
pub use tree::{Community, CommunityId, CommunityTree};
