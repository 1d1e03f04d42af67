pub mod format;
mod policy;
mod service;

pub use policy::AllowList;
pub use service::{ChatService, DEFAULT_READ_LIMIT, MAX_READ_LIMIT};
