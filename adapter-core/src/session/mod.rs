mod manager;
mod registry;
mod session;
mod sweeper;

pub use manager::{SessionManager, SessionManagerConfig, SweepReport};
pub use registry::SessionRegistry;
pub use session::{SessionId, SessionSnapshot, SessionState};
pub use sweeper::Sweeper;

pub(crate) use session::{Session, Touch};
