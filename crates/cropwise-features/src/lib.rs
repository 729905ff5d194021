//! Domain types and transforms shared by training and serving.
//!
//! A [`CropSample`] holds the seven bounded soil and climate measurements.
//! [`EngineeredFeatures`] derives eight agronomic ratios from it, giving the
//! 15-column vector the classifier is trained on. [`StandardScaler`] and
//! [`LabelEncoder`] are the fitted preprocessing steps stored next to the
//! model.

mod engineer;
mod error;
mod labels;
mod sample;
mod scaler;

pub use engineer::{EngineeredFeatures, FEATURE_NAMES, N_FEATURES, feature_names};
pub use error::{FeatureError, FieldError, FieldErrorKind};
pub use labels::LabelEncoder;
pub use sample::{CropSample, FIELD_BOUNDS, FieldBounds, RAW_FEATURE_NAMES};
pub use scaler::StandardScaler;
