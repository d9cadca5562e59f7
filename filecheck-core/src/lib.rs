pub mod algorithm;
pub mod cancel;
pub mod digest;
pub mod error;
pub mod manifest;
pub mod ops;
pub mod path_safety;
pub mod progress;
pub mod reconcile;
pub mod walk;

pub use algorithm::Algorithm;
pub use error::{Error, ErrorKind, Result};
