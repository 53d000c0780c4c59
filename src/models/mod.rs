mod order;
mod session;
mod user;

pub use order::*;
pub use session::*;
pub use user::*;
