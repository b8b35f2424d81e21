//! Ordered handler chain.

use std::sync::Arc;

use super::{HandlerResult, Next, RequestHandler};
use crate::core::{Request, Response};

/// A chain of handlers executed in registration order.
///
/// `on_response` hooks run in reverse order for the handlers that ran.
#[derive(Clone, Default)]
pub struct HandlerChain {
    handlers: Vec<Arc<dyn RequestHandler>>,
}

/// Outcome of running a chain.
#[derive(Debug)]
pub struct ChainOutcome {
    /// Number of handlers that ran (including the one that stopped or failed).
    pub ran: usize,
    pub result: HandlerResult,
}

impl HandlerChain {
    /// Create a new empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler (builder style).
    pub fn with<H: RequestHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Arc::new(handler));
        self
    }

    /// Append a shared handler.
    pub fn push(&mut self, handler: Arc<dyn RequestHandler>) {
        self.handlers.push(handler);
    }

    /// Append all handlers of another chain.
    pub fn extend(&mut self, other: &HandlerChain) {
        self.handlers.extend(other.handlers.iter().cloned());
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handler names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name()).collect()
    }

    /// Run handlers until one stops or fails.
    ///
    /// A failing handler's error is sent as the response.
    pub async fn run(&self, req: &mut Request, res: &mut Response) -> ChainOutcome {
        let mut ran = 0;
        for handler in &self.handlers {
            ran += 1;
            match handler.handle(req, res).await {
                Ok(Next::Continue) => {}
                Ok(Next::Stop) => {
                    tracing::trace!(handler = handler.name(), "chain stopped");
                    return ChainOutcome {
                        ran,
                        result: Ok(Next::Stop),
                    };
                }
                Err(err) => {
                    tracing::debug!(
                        handler = handler.name(),
                        status = err.status().as_u16(),
                        error = %err,
                        "handler failed"
                    );
                    res.send_error(err.clone());
                    return ChainOutcome {
                        ran,
                        result: Err(err),
                    };
                }
            }
        }
        ChainOutcome {
            ran,
            result: Ok(Next::Continue),
        }
    }

    /// Run `on_response` for the first `ran` handlers, last first.
    pub fn respond(&self, ran: usize, req: &Request, res: &mut Response) {
        for handler in self.handlers.iter().take(ran).rev() {
            handler.on_response(req, res);
        }
    }
}

/// Anything that can be registered where a handler list is expected:
/// a single handler or a whole chain.
pub trait IntoChain {
    fn into_chain(self) -> HandlerChain;
}

impl<H: RequestHandler + 'static> IntoChain for H {
    fn into_chain(self) -> HandlerChain {
        HandlerChain::new().with(self)
    }
}

impl IntoChain for HandlerChain {
    fn into_chain(self) -> HandlerChain {
        self
    }
}

impl std::fmt::Debug for HandlerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
