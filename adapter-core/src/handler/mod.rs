mod echo;
mod process;

pub use echo::EchoHandler;
pub use process::{ProcessHandler, ProcessHandlerConfig};

use async_trait::async_trait;

use crate::envelope::Payload;
use crate::error::HandlerError;
use crate::session::SessionSnapshot;

/// Per-call context handed to handlers
#[derive(Debug, Clone)]
pub struct CallContext {
    pub request_id: String,
    pub session: SessionSnapshot,
}

/// Business logic behind the router
/// Only ever invoked after the session has been validated
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: &CallContext, payload: Payload) -> Result<Payload, HandlerError>;

    fn name(&self) -> &str {
        "handler"
    }
}
