//! Object registry: maps target keys to served objects.
//!
//! The registry is filled during setup and then shared read-only between
//! connection loops (`Arc<ObjectRegistry>`). Entries are never removed.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use cxorb_wire::{
    class, status, CommandHeader, Decoder, Encoder, ObjectKey, ResponseHeader, SeqBuffer,
    RESPONSE_HEADER_SIZE,
};
use tracing::{debug, warn};

use crate::error::{OrbError, Result};
use crate::object::RemoteObject;

/// Default cap on the number of registered objects.
pub const DEFAULT_MAX_OBJECTS: usize = 64;

/// Registry mapping object keys to served objects.
pub struct ObjectRegistry {
    objects: HashMap<ObjectKey, Arc<dyn RemoteObject>>,
    max_objects: usize,
}

impl ObjectRegistry {
    /// Create a new empty registry holding at most [`DEFAULT_MAX_OBJECTS`].
    pub fn new() -> Self {
        Self::with_max_objects(DEFAULT_MAX_OBJECTS)
    }

    pub fn with_max_objects(max_objects: usize) -> Self {
        Self {
            objects: HashMap::new(),
            max_objects,
        }
    }

    /// Register `object` under `key`.
    pub fn register(&mut self, key: ObjectKey, object: impl RemoteObject + 'static) -> Result<()> {
        self.register_shared(key, Arc::new(object))
    }

    /// Register an object that is also held elsewhere.
    pub fn register_shared(&mut self, key: ObjectKey, object: Arc<dyn RemoteObject>) -> Result<()> {
        if self.objects.contains_key(&key) {
            return Err(OrbError::DuplicateKey(key));
        }
        if self.objects.len() >= self.max_objects {
            return Err(OrbError::RegistryFull(self.max_objects));
        }
        debug!(object = %key, class = object.class_name(), "registered object");
        self.objects.insert(key, object);
        Ok(())
    }

    pub fn get(&self, key: ObjectKey) -> Option<&Arc<dyn RemoteObject>> {
        self.objects.get(&key)
    }

    pub fn contains(&self, key: ObjectKey) -> bool {
        self.objects.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn max_objects(&self) -> usize {
        self.max_objects
    }

    /// Registered keys, ascending.
    pub fn keys(&self) -> Vec<ObjectKey> {
        let mut keys: Vec<ObjectKey> = self.objects.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Invoke `operation` on the object at `target` and return the status.
    ///
    /// Failures never escape: an unknown target or operation, or a handler
    /// error, becomes a negative status. Whatever the handler wrote to
    /// `reply` is kept only when the status is [`status::SUCCESS`].
    pub fn dispatch(
        &self,
        target: ObjectKey,
        operation: u32,
        params: &mut Decoder<'_>,
        reply: &mut Encoder<'_>,
    ) -> i32 {
        let Some(object) = self.get(target) else {
            warn!(
                object = %target,
                class = class::name(target.class_id()),
                operation,
                "command for unknown object"
            );
            return status::UNKNOWN_OBJ;
        };

        let start = reply.len();
        let status = match object.invoke(operation, params, reply) {
            Ok(status) => status,
            Err(err) => {
                let status = err.status();
                warn!(
                    object = %target,
                    class = object.class_name(),
                    operation,
                    status,
                    error = %err,
                    "operation failed"
                );
                status
            }
        };

        if status != status::SUCCESS {
            reply.buffer_mut().restore_position(start);
        }
        status
    }

    /// Dispatch a received command frame.
    ///
    /// `frame` holds the command header followed by the parameter block,
    /// positioned for reading at offset 0. `reply` is cleared and left
    /// holding a response-header-sized gap followed by the payload, so that
    /// payload alignment is relative to the start of the response header as
    /// the caller will see it. Returns the command and the response header
    /// to send in front of `reply.filled()[RESPONSE_HEADER_SIZE..]`.
    pub fn dispatch_frame(
        &self,
        frame: &mut SeqBuffer,
        reply: &mut SeqBuffer,
    ) -> Result<(CommandHeader, ResponseHeader)> {
        let mut params = Decoder::new(frame);
        let command = CommandHeader::decode(&mut params)?;

        reply.clear();
        let mut encoder = Encoder::new(reply);
        encoder.put_bytes(&[0u8; RESPONSE_HEADER_SIZE])?;

        let status = self.dispatch(
            command.target,
            command.operation,
            &mut params,
            &mut encoder,
        );
        debug!(
            msg_id = command.msg_id,
            object = %command.target,
            operation = command.operation,
            status,
            "dispatched command"
        );
        Ok((command, ResponseHeader::new(command.msg_id, status)))
    }
}

impl Default for ObjectRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRegistry")
            .field("keys", &self.keys())
            .field("max_objects", &self.max_objects)
            .finish()
    }
}
