//! Contentflow Classifier: confidence-scored tags for business text
//!
//! # Example
//!
//! ```ignore
//! use cflow_classifier::{ClassifierConfig, TagDetector};
//! use cflow_core::AiProvider;
//!
//! let detector = TagDetector::new(ClassifierConfig::default(), AiProvider::Unavailable);
//! let detection = detector.detect_local("Globex announced a price cut", 0.5);
//! assert!(detection.has_tag("pricing_change"));
//! ```

pub mod detector;
pub mod normalizer;
pub mod taxonomy;

pub use detector::{
    parse_ai_tags, ClassifierConfig, DetectOptions, DetectedTag, TagDetection, TagDetector, TagSource,
};
pub use normalizer::normalize;
