pub mod error;
pub mod session;

pub use error::{RecvError, SendError};
pub use session::{Decoded, Session};
