//! Server-side object capability and per-class operation tables.
//!
//! Every served object exposes one capability, [`RemoteObject::invoke`].
//! Most objects get it from a [`Skeleton`], which pairs an implementation
//! with an [`OperationTable`] built once for its class:
//!
//! ```
//! use std::sync::Arc;
//! use cxorb_orb::{OperationTable, Skeleton};
//!
//! struct Counter(std::sync::atomic::AtomicU32);
//!
//! let table = Arc::new(OperationTable::new("counter").with(0, |c: &Counter, _params, reply| {
//!     let next = c.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
//!     reply.put_u32(next)?;
//!     Ok(cxorb_orb::status::SUCCESS)
//! }));
//! let skeleton = Skeleton::new(Counter(Default::default()), table);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use cxorb_wire::{status, Decoder, Encoder};

use crate::error::{OrbError, Result};

/// An object that can be invoked through the registry.
///
/// `params` is positioned at the first parameter byte; `reply` at the first
/// payload byte. The returned status is sent to the caller; the reply
/// payload is only sent when it is [`status::SUCCESS`]. Errors are turned
/// into a status with [`OrbError::status`].
pub trait RemoteObject: Send + Sync {
    fn invoke(
        &self,
        operation: u32,
        params: &mut Decoder<'_>,
        reply: &mut Encoder<'_>,
    ) -> Result<i32>;

    /// Class name used in logs.
    fn class_name(&self) -> &str {
        "object"
    }
}

/// Handler bound to an operation code.
pub type Operation<T> =
    Box<dyn Fn(&T, &mut Decoder<'_>, &mut Encoder<'_>) -> Result<i32> + Send + Sync>;

/// Operation code to handler map for one class of object.
pub struct OperationTable<T> {
    class_name: String,
    operations: HashMap<u32, Operation<T>>,
}

impl<T> OperationTable<T> {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            operations: HashMap::new(),
        }
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with<F>(mut self, operation: u32, handler: F) -> Self
    where
        F: Fn(&T, &mut Decoder<'_>, &mut Encoder<'_>) -> Result<i32> + Send + Sync + 'static,
    {
        self.insert(operation, handler);
        self
    }

    /// Bind `handler` to `operation`, replacing any previous binding.
    pub fn insert<F>(&mut self, operation: u32, handler: F)
    where
        F: Fn(&T, &mut Decoder<'_>, &mut Encoder<'_>) -> Result<i32> + Send + Sync + 'static,
    {
        self.operations.insert(operation, Box::new(handler));
    }

    pub fn get(&self, operation: u32) -> Option<&Operation<T>> {
        self.operations.get(&operation)
    }

    pub fn contains(&self, operation: u32) -> bool {
        self.operations.contains_key(&operation)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Bound operation codes, ascending.
    pub fn operations(&self) -> Vec<u32> {
        let mut ops: Vec<u32> = self.operations.keys().copied().collect();
        ops.sort_unstable();
        ops
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }
}

impl<T> fmt::Debug for OperationTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationTable")
            .field("class_name", &self.class_name)
            .field("operations", &self.operations())
            .finish()
    }
}

/// An implementation paired with its class's operation table.
pub struct Skeleton<T> {
    object: T,
    table: Arc<OperationTable<T>>,
}

impl<T> Skeleton<T> {
    pub fn new(object: T, table: Arc<OperationTable<T>>) -> Self {
        Self { object, table }
    }

    pub fn object(&self) -> &T {
        &self.object
    }

    pub fn table(&self) -> &OperationTable<T> {
        &self.table
    }
}

impl<T: Send + Sync> RemoteObject for Skeleton<T> {
    fn invoke(
        &self,
        operation: u32,
        params: &mut Decoder<'_>,
        reply: &mut Encoder<'_>,
    ) -> Result<i32> {
        let handler = self
            .table
            .get(operation)
            .ok_or(OrbError::UnknownOperation { operation })?;
        handler(&self.object, params, reply)
    }

    fn class_name(&self) -> &str {
        self.table.class_name()
    }
}

/// Convenience status for handlers that completed normally.
pub fn success() -> Result<i32> {
    Ok(status::SUCCESS)
}
