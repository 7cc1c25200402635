//! Infrastructure wiring: collaborator traits, the dependency container,
//! and mock implementations for tests.

pub mod deps;
pub mod test_dependencies;
pub mod traits;

pub use deps::AuthDeps;
pub use traits::{BaseOtpDelivery, BaseUserDirectory};
