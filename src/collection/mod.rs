//! Collection module: persisting user-confirmed images for retraining

pub mod naming;
pub mod store;

pub use naming::{confidence_digits, FilenameTemplate, MOBILE_PREFIX, TIMESTAMP_FORMAT};
pub use store::{CollectionStats, CollectionStore};
