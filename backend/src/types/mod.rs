mod environment;
mod error;
mod event;

pub use environment::Environment;
pub use error::AppError;
pub use event::InboundEvent;
