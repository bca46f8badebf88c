//! Accident-severity inference service.
//!
//! Request fields are encoded into the one-hot feature row the classifier was
//! trained on, the classifier is run, and the numeric class is decoded to a
//! severity label.

pub mod config;
pub mod encoder;
pub mod error;
pub mod model;
pub mod schema;
pub mod server;
#[cfg(feature = "torch")]
pub mod torch;
pub mod types;

pub use config::ServerConfig;
pub use encoder::{encode, FeatureVector, RawInput};
pub use error::{InferenceError, PredictError, ValidationError};
pub use model::{infer, load_classifier, Classifier, ModelState, TreeEnsemble};
pub use schema::Schema;
pub use server::{build_router, AppState};
pub use types::{PredictionOut, Severity};
