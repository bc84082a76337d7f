//! Store repositories, one unit struct per table.

mod control_objects;
mod facial_features;
mod images;

pub use control_objects::ControlObjectRepo;
pub use facial_features::FacialFeaturesRepo;
pub use images::ImageRepo;
