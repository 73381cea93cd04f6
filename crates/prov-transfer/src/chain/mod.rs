//! Responder-side validation of inbound transfer requests.
//!
//! A request passes through an ordered list of validators. Each receives the
//! payload the previous one produced and may narrow it or fail; the first
//! failure ends the run.

mod filters;
mod terminal;

use std::sync::Arc;

use async_trait::async_trait;
use prov_ledger::LedgerClient;
use prov_protocol::CallContext;
use tracing::debug;

use crate::error::{TransferError, TransferResult};
use crate::payload::TransferPayload;

pub use filters::{ExistenceFilter, HashValidityFilter};
pub use terminal::{NoopTerminal, PublishTerminal};

// ---------------------------------------------------------------------------
// TransferValidator
// ---------------------------------------------------------------------------

/// One step of the validation chain.
#[async_trait]
pub trait TransferValidator: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Check or narrow `payload`, passing the result on.
    async fn validate(&self, ctx: &CallContext, payload: TransferPayload) -> TransferResult<TransferPayload>;
}

// ---------------------------------------------------------------------------
// ValidationChain
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct ValidationChain {
    validators: Vec<Arc<dyn TransferValidator>>,
}

impl ValidationChain {
    /// An empty chain that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hash validity, then existence on `ledger` if one is given, then
    /// `terminal`.
    pub fn with_default_validators(
        ledger: Option<Arc<dyn LedgerClient>>,
        terminal: Arc<dyn TransferValidator>,
    ) -> Self {
        let mut chain = Self::new();
        chain.push(Arc::new(HashValidityFilter));
        if let Some(ledger) = ledger {
            chain.push(Arc::new(ExistenceFilter::new(ledger)));
        }
        chain.push(terminal);
        chain
    }

    /// Build a chain from handlers in registration order. The handler
    /// registered last runs first.
    pub fn from_registered(handlers: Vec<Arc<dyn TransferValidator>>) -> Self {
        let mut chain = Self::new();
        for handler in handlers {
            chain.layer(handler);
        }
        chain
    }

    /// Run `validator` after everything already in the chain.
    pub fn push(&mut self, validator: Arc<dyn TransferValidator>) {
        self.validators.push(validator);
    }

    /// Run `validator` before everything already in the chain.
    pub fn layer(&mut self, validator: Arc<dyn TransferValidator>) {
        self.validators.insert(0, validator);
    }

    /// Validator names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.validators.iter().map(|v| v.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    pub async fn run(&self, ctx: &CallContext, mut payload: TransferPayload) -> TransferResult<TransferPayload> {
        for validator in &self.validators {
            if let Some(reason) = ctx.interrupted() {
                return Err(TransferError::deadline(validator.name(), reason));
            }
            payload = validator.validate(ctx, payload).await.map_err(|err| {
                debug!(validator = validator.name(), error = %err, "validation failed");
                err
            })?;
            debug!(
                validator = validator.name(),
                edges = payload.exposed.len(),
                "validator passed"
            );
        }
        Ok(payload)
    }
}
