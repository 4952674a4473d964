//! Leaf components for child-process plumbing: port allocation, environment
//! sanitization, handshake parsing, and (unix) process-group termination.

mod env;
mod handshake;
mod port;
pub(crate) mod terminate;

pub use env::build_environment;
pub use handshake::Handshake;
pub use port::find_available_port;
