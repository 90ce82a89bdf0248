pub mod cookies;
pub mod error;
pub mod lifecycle;
pub mod login;
pub mod markup;
pub mod pool;
pub mod session;

pub use cookies::{CookieRecord, RecordingJar};
pub use error::AuthError;
pub use lifecycle::SessionManager;
pub use pool::SessionPool;
pub use session::{PageResponse, Session};
