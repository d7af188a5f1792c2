//! Payloads: one unit of requested work inside a message.

use crate::entry::ErrorEntry;
use crate::error::{ProtocolError, ProtocolResult};
use crate::wire::WirePayload;
use serde_json::{Map, Value};

/// Content category a payload targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Module {
    /// Articles (posts with an image and tags).
    Articles,
}

impl Module {
    /// Every module known to the protocol.
    pub const ALL: [Module; 1] = [Module::Articles];

    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Articles => "articles",
        }
    }

    /// Resolves a wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|module| module.as_str() == name)
    }
}

/// Operation requested for a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Action {
    /// Create a record (`post`).
    Create,
    /// Retrieve a record (`get`).
    Retrieve,
    /// Update a record (`patch`).
    Update,
    /// Delete a record (`delete`).
    Delete,
}

impl Action {
    /// Every action known to the protocol.
    pub const ALL: [Action; 4] = [
        Action::Create,
        Action::Retrieve,
        Action::Update,
        Action::Delete,
    ];

    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "post",
            Action::Retrieve => "get",
            Action::Update => "patch",
            Action::Delete => "delete",
        }
    }

    /// Resolves a wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|action| action.as_str() == name)
    }
}

/// Errors and status accumulated for one unit of work.
#[derive(Debug, Clone, PartialEq, Default)]
struct Outcome {
    errors: Vec<ErrorEntry>,
    status: Option<u16>,
    success: bool,
}

impl Outcome {
    fn add_error(&mut self, error: ErrorEntry) {
        self.errors.push(error);
        self.recompute();
    }

    fn set_status(&mut self, status: u16) {
        self.status = Some(status);
        self.recompute();
    }

    // success = 2xx status and no errors
    fn recompute(&mut self) {
        self.success =
            matches!(self.status, Some(status) if (200..300).contains(&status))
                && self.errors.is_empty();
    }
}

/// Fields of a payload as decoded from the wire, before name resolution.
struct RawPayload {
    identifier: String,
    module: String,
    action: String,
    data: Map<String, Value>,
    outcome: Outcome,
}

impl RawPayload {
    fn from_data(data: &Value) -> ProtocolResult<Self> {
        let map = data
            .as_object()
            .ok_or_else(|| ProtocolError::malformed("payload is not an object"))?;

        let get_field = |name: &str| {
            map.get(name).ok_or_else(|| {
                ProtocolError::malformed(format!("payload does not contain a key \"{name}\""))
            })
        };

        let text_field = |name: &str| -> ProtocolResult<String> {
            get_field(name)?
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| ProtocolError::malformed(format!("payload {name} is not a string")))
        };

        let identifier = text_field("identifier")?;
        let module = text_field("module")?;
        let action = text_field("action")?;

        let data = match map.get("data") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(data)) => data.clone(),
            Some(Value::Array(items)) if items.is_empty() => Map::new(),
            Some(_) => return Err(ProtocolError::malformed("payload data is not a map")),
        };

        let mut outcome = Outcome {
            errors: map
                .get("errors")
                .map(ErrorEntry::list_from_data)
                .transpose()?
                .unwrap_or_default(),
            status: match map.get("status") {
                None | Some(Value::Null) => None,
                Some(status) => Some(
                    status
                        .as_u64()
                        .and_then(|status| u16::try_from(status).ok())
                        .ok_or_else(|| ProtocolError::malformed("payload status is not a code"))?,
                ),
            },
            success: false,
        };

        match map.get("success") {
            Some(Value::Bool(success)) => outcome.success = *success,
            None | Some(Value::Null) => outcome.recompute(),
            Some(_) => return Err(ProtocolError::malformed("payload success is not a flag")),
        }

        Ok(Self {
            identifier,
            module,
            action,
            data,
            outcome,
        })
    }
}

/// One unit of work: a module, an action and the data for it.
///
/// `success` is derived from the status and the error list and is
/// recomputed on every mutation: a payload is successful only with a
/// 2xx status and no errors.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    identifier: String,
    module: Module,
    action: Action,
    data: Map<String, Value>,
    extra: Map<String, Value>,
    outcome: Outcome,
}

impl Payload {
    /// Creates an empty payload.
    pub fn new(identifier: impl Into<String>, module: Module, action: Action) -> Self {
        Self {
            identifier: identifier.into(),
            module,
            action,
            data: Map::new(),
            extra: Map::new(),
            outcome: Outcome::default(),
        }
    }

    /// Creates a payload from wire names, failing on unknown values.
    pub fn from_names(
        identifier: impl Into<String>,
        module: &str,
        action: &str,
    ) -> ProtocolResult<Self> {
        let module =
            Module::from_name(module).ok_or_else(|| ProtocolError::InvalidModule(module.into()))?;
        let action =
            Action::from_name(action).ok_or_else(|| ProtocolError::InvalidAction(action.into()))?;
        Ok(Self::new(identifier, module, action))
    }

    /// Replaces the data map.
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// Replaces the side-channel map.
    pub fn with_extra(mut self, extra: Map<String, Value>) -> Self {
        self.extra = extra;
        self
    }

    /// Rebuilds a payload from decoded wire data.
    ///
    /// `identifier`, `module` and `action` are required; `data`, `errors`,
    /// `status` and `success` are optional. A received `success` flag is
    /// kept as sent so the message re-digests to the sender's value.
    pub fn from_data(data: &Value) -> ProtocolResult<Self> {
        let raw = RawPayload::from_data(data)?;
        let mut payload = Self::from_names(raw.identifier, &raw.module, &raw.action)?;
        payload.data = raw.data;
        payload.outcome = raw.outcome;
        Ok(payload)
    }

    /// Sets a single data key.
    pub fn add_data(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Merges a map into the data, overwriting existing keys.
    pub fn merge_data(&mut self, data: Map<String, Value>) -> &mut Self {
        self.data.extend(data);
        self
    }

    /// Adds side-channel data that is never serialized.
    ///
    /// If `key` already holds a map and `value` is a map, the entries are
    /// merged into it; otherwise the value is stored under `key`.
    pub fn add_extra(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        let key = key.into();
        match (self.extra.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => existing.extend(incoming),
            (_, value) => {
                self.extra.insert(key, value);
            }
        }
        self
    }

    /// Appends an error.
    pub fn add_error(&mut self, error: ErrorEntry) -> &mut Self {
        self.outcome.add_error(error);
        self
    }

    /// Sets the HTTP-style status.
    pub fn set_status(&mut self, status: u16) -> &mut Self {
        self.outcome.set_status(status);
        self
    }

    /// Appends an error, by value.
    pub fn with_error(mut self, error: ErrorEntry) -> Self {
        self.add_error(error);
        self
    }

    /// Sets the status, by value.
    pub fn with_status(mut self, status: u16) -> Self {
        self.set_status(status);
        self
    }

    /// Starts the reply to this payload: same identifier, module and
    /// action, with empty data and no errors or status.
    pub fn make_response(&self) -> Self {
        Self::new(self.identifier.clone(), self.module, self.action)
    }

    /// Returns the correlation identifier.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Returns the module.
    pub fn module(&self) -> Module {
        self.module
    }

    /// Returns the action.
    pub fn action(&self) -> Action {
        self.action
    }

    /// Returns the data map.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Returns a data value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Returns a side-channel value.
    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Returns the accumulated errors.
    pub fn errors(&self) -> &[ErrorEntry] {
        &self.outcome.errors
    }

    /// Returns true if any error was recorded.
    pub fn has_errors(&self) -> bool {
        !self.outcome.errors.is_empty()
    }

    /// Returns the status, if set.
    pub fn status(&self) -> Option<u16> {
        self.outcome.status
    }

    /// Returns the success flag.
    pub fn success(&self) -> bool {
        self.outcome.success
    }

    pub(crate) fn to_wire(&self) -> WirePayload {
        WirePayload {
            identifier: self.identifier.clone(),
            module: self.module.as_str().to_string(),
            action: self.action.as_str().to_string(),
            data: self.data.clone(),
            errors: self.outcome.errors.clone(),
            status: self.outcome.status,
            success: self.outcome.success,
        }
    }
}

/// A received payload whose module or action is not recognized.
///
/// It keeps its raw fields so the message still re-digests, and so the
/// endpoint can answer it with a routing error under the same identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct UnroutablePayload {
    identifier: String,
    module: String,
    action: String,
    data: Map<String, Value>,
    outcome: Outcome,
    reason: ProtocolError,
}

impl UnroutablePayload {
    /// Returns the correlation identifier.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Returns the module name as received.
    pub fn module_name(&self) -> &str {
        &self.module
    }

    /// Returns the action name as received.
    pub fn action_name(&self) -> &str {
        &self.action
    }

    /// Returns why the payload could not be resolved.
    pub fn reason(&self) -> &ProtocolError {
        &self.reason
    }

    /// Starts the reply: same identifier and names, no data.
    pub fn make_response(&self) -> Self {
        Self {
            identifier: self.identifier.clone(),
            module: self.module.clone(),
            action: self.action.clone(),
            data: Map::new(),
            outcome: Outcome::default(),
            reason: self.reason.clone(),
        }
    }

    /// Appends an error, by value.
    pub fn with_error(mut self, error: ErrorEntry) -> Self {
        self.outcome.add_error(error);
        self
    }

    /// Sets the status, by value.
    pub fn with_status(mut self, status: u16) -> Self {
        self.outcome.set_status(status);
        self
    }

    /// Returns the accumulated errors.
    pub fn errors(&self) -> &[ErrorEntry] {
        &self.outcome.errors
    }

    /// Returns the status, if set.
    pub fn status(&self) -> Option<u16> {
        self.outcome.status
    }

    /// Returns the success flag.
    pub fn success(&self) -> bool {
        self.outcome.success
    }

    fn to_wire(&self) -> WirePayload {
        WirePayload {
            identifier: self.identifier.clone(),
            module: self.module.clone(),
            action: self.action.clone(),
            data: self.data.clone(),
            errors: self.outcome.errors.clone(),
            status: self.outcome.status,
            success: self.outcome.success,
        }
    }
}

/// An entry in a message's payload collection.
#[derive(Debug, Clone, PartialEq)]
pub enum PayloadEntry {
    /// A payload with a known module and action.
    Routable(Payload),
    /// A received payload that cannot be routed.
    Unroutable(UnroutablePayload),
}

impl PayloadEntry {
    /// Decodes an entry, keeping unknown module/action names as unroutable.
    pub fn from_data(data: &Value) -> ProtocolResult<Self> {
        let raw = RawPayload::from_data(data)?;
        match Payload::from_names(raw.identifier.clone(), &raw.module, &raw.action) {
            Ok(payload) => Ok(PayloadEntry::Routable(Payload {
                data: raw.data,
                outcome: raw.outcome,
                ..payload
            })),
            Err(reason @ (ProtocolError::InvalidModule(_) | ProtocolError::InvalidAction(_))) => {
                Ok(PayloadEntry::Unroutable(UnroutablePayload {
                    identifier: raw.identifier,
                    module: raw.module,
                    action: raw.action,
                    data: raw.data,
                    outcome: raw.outcome,
                    reason,
                }))
            }
            Err(err) => Err(err),
        }
    }

    /// Returns the correlation identifier.
    pub fn identifier(&self) -> &str {
        match self {
            PayloadEntry::Routable(payload) => payload.identifier(),
            PayloadEntry::Unroutable(payload) => payload.identifier(),
        }
    }

    /// Returns the accumulated errors.
    pub fn errors(&self) -> &[ErrorEntry] {
        match self {
            PayloadEntry::Routable(payload) => payload.errors(),
            PayloadEntry::Unroutable(payload) => payload.errors(),
        }
    }

    /// Returns the status, if set.
    pub fn status(&self) -> Option<u16> {
        match self {
            PayloadEntry::Routable(payload) => payload.status(),
            PayloadEntry::Unroutable(payload) => payload.status(),
        }
    }

    /// Returns the success flag.
    pub fn success(&self) -> bool {
        match self {
            PayloadEntry::Routable(payload) => payload.success(),
            PayloadEntry::Unroutable(payload) => payload.success(),
        }
    }

    /// Returns the routable payload, if this is one.
    pub fn as_payload(&self) -> Option<&Payload> {
        match self {
            PayloadEntry::Routable(payload) => Some(payload),
            PayloadEntry::Unroutable(_) => None,
        }
    }

    pub(crate) fn to_wire(&self) -> WirePayload {
        match self {
            PayloadEntry::Routable(payload) => payload.to_wire(),
            PayloadEntry::Unroutable(payload) => payload.to_wire(),
        }
    }
}
