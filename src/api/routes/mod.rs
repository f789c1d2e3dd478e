//! API route modules.

pub mod captions;
pub mod session;
