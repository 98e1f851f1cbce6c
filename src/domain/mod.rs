pub mod message;
pub mod types;
pub mod user;

pub use message::{MessageId, MessageResult};
pub use types::{Batch, ReportLine};
pub use user::User;
