mod auth;
mod feedback;
mod session;
mod store;

pub use auth::*;
pub use feedback::*;
pub use session::*;
pub use store::*;
