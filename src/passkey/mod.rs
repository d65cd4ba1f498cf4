pub mod models;
pub mod service;
pub mod verifier;

pub use models::*;
pub use service::*;
pub use verifier::*;
