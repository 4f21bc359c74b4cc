pub mod config;
pub mod frame;
pub mod grid;
pub mod metadata;
pub mod point;

pub use config::{ConfigOverrides, GeometrySpec, GridSpec, ModelConfig, SidecarConfig, Transform};
pub use frame::{BoundingBox, CoordinateIndex, GridFrame, PointFrame, PointRecord};
pub use grid::GridModel;
pub use metadata::DatasetMetadata;
pub use point::PointModel;
