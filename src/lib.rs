pub mod classifier;
pub mod clip;
pub mod config;
pub mod court;
pub mod dataset;
pub mod detector;
pub mod error;
pub mod features;
pub mod fetch;
pub mod frame;
pub mod math;
pub mod optim;
pub mod pipeline;
pub mod spline;
pub mod track;

pub use classifier::ZoneClassifier;
pub use clip::{ClipProcessor, ClipSample};
pub use config::PipelineConfig;
pub use court::{zone_of, CourtGeometry, Homography, Zone};
pub use error::{Error, Result};
pub use features::FeatureVector;
pub use frame::Frame;
pub use track::{DenseTrack, Observation, Track};

use std::fmt;

pub trait Float: num_traits::Float + num_traits::FromPrimitive + fmt::Debug + 'static {}

impl<T> Float for T where T: num_traits::Float + num_traits::FromPrimitive + fmt::Debug + 'static {}
