//! Remote objects over the cxorb wire format.
//!
//! The server side registers objects under [`ObjectKey`]s in an
//! [`ObjectRegistry`] and serves them with an [`ObjectServer`], which runs
//! one [`Dispatcher`] per connection. The client side makes sequential
//! calls through a [`Client`] and binds objects with [`Stub`]s.

pub mod client;
pub mod connector;
pub mod dispatcher;
pub mod error;
pub mod interface;
pub mod object;
pub mod registry;
pub mod server;

#[cfg(feature = "async")]
pub mod async_server;

pub use client::{Client, ClientConfig, Reply, Stub};
pub use connector::{client_for_stream, connect, connect_with_config};
pub use dispatcher::{DispatchState, DispatchSummary, Dispatcher, StopHandle};
pub use error::{OrbError, Result};
pub use interface::Marshal;
pub use object::{success, Operation, OperationTable, RemoteObject, Skeleton};
pub use registry::{ObjectRegistry, DEFAULT_MAX_OBJECTS};
pub use server::{ObjectServer, ServerConfig, ACCEPT_BACKOFF};

pub use cxorb_wire::{class, status, Decoder, Encoder, ObjectKey};
