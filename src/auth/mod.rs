pub mod error;
pub mod middleware;
pub mod service;
pub mod storage;
pub mod types;

pub use error::AuthError;
pub use middleware::auth_middleware;
pub use service::Auth;
pub use storage::{AuthStorage, SqliteAuthStorage};
pub use types::{SessionInfo, VerifiedUser};
