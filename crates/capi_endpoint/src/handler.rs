//! Content handlers and the module dispatch table.

use crate::error::{EndpointError, EndpointResult};
use crate::store::ContentStore;
use capi_protocol::{codes, Action, ErrorEntry, Message, Module, Payload};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Handles the payloads of one module.
///
/// Each action method receives the request payload, the store and the
/// response message. It builds its reply with
/// [`Payload::make_response`], validates, runs its effects in a store
/// transaction and appends exactly one payload to `response` (see
/// [`answer`]).
pub trait ContentHandler: Send + Sync {
    /// Module this handler serves.
    fn module(&self) -> Module;

    /// Handles a `post` payload.
    fn create(&self, payload: &Payload, store: &mut dyn ContentStore, response: &mut Message);

    /// Handles a `get` payload.
    ///
    /// Answers with "not implemented" unless overridden.
    fn retrieve(&self, payload: &Payload, _store: &mut dyn ContentStore, response: &mut Message) {
        let reply = payload
            .make_response()
            .with_error(ErrorEntry::new(
                codes::NOT_IMPLEMENTED,
                format!("Action {} is not implemented", payload.action().as_str()),
            ))
            .with_status(501);
        answer(response, reply);
    }

    /// Handles a `patch` payload.
    fn update(&self, payload: &Payload, store: &mut dyn ContentStore, response: &mut Message);

    /// Handles a `delete` payload.
    fn delete(&self, payload: &Payload, store: &mut dyn ContentStore, response: &mut Message);

    /// Dispatches a payload to the method for its action.
    fn handle(&self, payload: &Payload, store: &mut dyn ContentStore, response: &mut Message) {
        debug!(
            identifier = payload.identifier(),
            module = payload.module().as_str(),
            action = payload.action().as_str(),
            "dispatching payload"
        );
        match payload.action() {
            Action::Create => self.create(payload, store, response),
            Action::Retrieve => self.retrieve(payload, store, response),
            Action::Update => self.update(payload, store, response),
            Action::Delete => self.delete(payload, store, response),
        }
    }
}

/// Appends a reply payload to the response.
///
/// A second reply for the same identifier is dropped and logged; the
/// first one stands.
pub fn answer(response: &mut Message, reply: Payload) {
    if let Err(err) = response.add_payload(reply) {
        warn!(error = %err, "dropping duplicate reply payload");
    }
}

/// Handlers keyed by module.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: BTreeMap<Module, Box<dyn ContentHandler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for its module.
    ///
    /// Fails if the module already has a handler.
    pub fn register<H: ContentHandler + 'static>(&mut self, handler: H) -> EndpointResult<()> {
        let module = handler.module();
        if self.handlers.contains_key(&module) {
            return Err(EndpointError::DuplicateHandler(module));
        }
        self.handlers.insert(module, Box::new(handler));
        Ok(())
    }

    /// Returns the handler for a module.
    pub fn get(&self, module: Module) -> Option<&dyn ContentHandler> {
        self.handlers.get(&module).map(|handler| handler.as_ref())
    }

    /// Returns the modules with a registered handler.
    pub fn modules(&self) -> impl Iterator<Item = Module> + '_ {
        self.handlers.keys().copied()
    }
}
