pub mod engine;
pub mod error;

pub use engine::{AuthzEngine, DEFAULT_MAX_DEPTH};
pub use error::AuthzError;
