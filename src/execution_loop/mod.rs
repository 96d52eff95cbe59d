pub mod error_classifier;
pub mod error_recovery;
pub mod messages;
pub mod patterns;
pub mod retry_loop;

pub use error_classifier::*;
pub use error_recovery::*;
pub use messages::*;
pub use patterns::*;
pub use retry_loop::*;
