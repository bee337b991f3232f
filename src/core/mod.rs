pub mod date_range;
pub mod launcher;
pub mod log_buffer;
pub mod session;

pub use crate::domain::channel::{ChannelRegistry, ChannelSpec};
pub use crate::domain::model::{SessionEvent, SessionState, ValidationVerdict};
pub use crate::domain::ports::{ConfigProvider, JobApi, StreamTransport};
pub use crate::utils::error::Result;
