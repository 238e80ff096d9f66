pub mod authentication;
pub mod permissions;
pub mod session;
pub mod subscriber;
pub mod user;

pub use authentication::*;
pub use permissions::*;
pub use session::*;
pub use subscriber::*;
pub use user::*;
