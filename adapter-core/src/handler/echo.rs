use async_trait::async_trait;

use super::{CallContext, Handler};
use crate::envelope::Payload;
use crate::error::HandlerError;

/// Returns every payload unchanged
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoHandler;

#[async_trait]
impl Handler for EchoHandler {
    async fn handle(&self, _ctx: &CallContext, payload: Payload) -> Result<Payload, HandlerError> {
        Ok(payload)
    }

    fn name(&self) -> &str {
        "echo"
    }
}
