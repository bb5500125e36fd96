pub mod client;
pub mod clock;
pub mod envelope;
pub mod error;
pub mod handler;
pub mod router;
pub mod session;

pub use client::{ClientError, LocalTransport, SessionHandle, Transport};
pub use clock::{Clock, ManualClock, SystemClock};
pub use envelope::{CreateSessionResponse, Outcome, Payload, RequestEnvelope, ResponseEnvelope};
pub use error::{ErrorDescriptor, ErrorKind, HandlerError, SessionError};
pub use handler::{CallContext, EchoHandler, Handler, ProcessHandler, ProcessHandlerConfig};
pub use router::RequestRouter;
pub use session::{
    SessionId, SessionManager, SessionManagerConfig, SessionSnapshot, SessionState, Sweeper,
    SweepReport,
};
