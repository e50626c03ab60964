//! Platform-agnostic core of the Villa bot gateway protocol: framing, control
//! packages, and the traits the tokio client plugs its collaborators into.

pub mod framing;
pub mod net;
pub mod package;
pub mod protocol;
pub mod token;
pub mod types;

pub use villaproto as proto;
