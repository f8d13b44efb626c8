//! Client-side call machinery.
//!
//! A [`Client`] owns one connection and performs strictly sequential
//! request/response calls on it: a call's command is written and its
//! response fully read while holding the connection lock, so calls from
//! several threads never interleave on the wire. Message ids are generated
//! per call and checked against the response.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use cxorb_transport::Stream;
use cxorb_wire::{
    class, status, CommandHeader, Decoder, Encoder, MessageType, ObjectKey, PacketReader, PacketWriter,
    ResponseHeader, SeqBuffer, WireConfig, WireError, DEFAULT_BUFFER_SIZE, RESPONSE_HEADER_SIZE,
};
use tracing::{debug, warn};

use crate::error::{OrbError, Result};

/// Client-side buffer sizes and wire limits.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub wire: WireConfig,
    /// Capacity of the command buffer (header + parameters).
    pub command_buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            wire: WireConfig::default(),
            command_buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// A decoded response.
///
/// The frame keeps the response header in front of the payload so that
/// payload values decode with the alignment the server encoded them with.
pub struct Reply {
    pub msg_id: u32,
    pub status: i32,
    frame: SeqBuffer,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        self.status == status::SUCCESS
    }

    /// Payload bytes after the response header.
    pub fn body(&self) -> &[u8] {
        &self.frame.as_slice()[RESPONSE_HEADER_SIZE..]
    }

    /// Decoder over the payload, positioned at its first byte.
    pub fn decoder(&mut self) -> Decoder<'_> {
        self.frame.restore_position(RESPONSE_HEADER_SIZE);
        Decoder::new(&mut self.frame)
    }
}

impl std::fmt::Debug for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reply")
            .field("msg_id", &self.msg_id)
            .field("status", &self.status)
            .field("body", &self.body())
            .finish()
    }
}

struct Connection<R, W> {
    reader: PacketReader<R>,
    writer: PacketWriter<W>,
    command_buf: SeqBuffer,
    poisoned: bool,
}

/// One connection to an object server.
pub struct Client<R = Stream, W = Stream> {
    conn: Mutex<Connection<R, W>>,
    next_id: AtomicU32,
    config: ClientConfig,
}

impl<R: Read, W: Write> Client<R, W> {
    /// Create a client over a reader/writer pair with default configuration.
    pub fn new(reader: R, writer: W) -> Self {
        let config = ClientConfig::default();
        Self::from_parts(
            PacketReader::with_config(reader, config.wire.clone()),
            PacketWriter::with_config(writer, config.wire.clone()),
            config,
        )
    }

    pub fn from_parts(reader: PacketReader<R>, writer: PacketWriter<W>, config: ClientConfig) -> Self {
        Self {
            conn: Mutex::new(Connection {
                reader,
                writer,
                command_buf: SeqBuffer::with_capacity(config.command_buffer_size),
                poisoned: false,
            }),
            next_id: AtomicU32::new(1),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Next message id. Ids start at 1 and wrap.
    pub fn next_msg_id(&self) -> u32 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// True once a failed call has left the connection unusable.
    pub fn is_poisoned(&self) -> bool {
        self.conn.lock().map(|conn| conn.poisoned).unwrap_or(true)
    }

    /// Call `operation` on `target`, writing parameters with `params`.
    ///
    /// Returns the reply whatever its status.
    pub fn call_with<F>(&self, target: ObjectKey, operation: u32, params: F) -> Result<Reply>
    where
        F: FnOnce(&mut Encoder<'_>) -> Result<()>,
    {
        let mut conn = self.lock()?;
        let msg_id = self.next_msg_id();

        conn.command_buf.clear();
        {
            let mut enc = Encoder::new(&mut conn.command_buf);
            CommandHeader::new(msg_id, target, operation).encode(&mut enc)?;
            params(&mut enc)?;
        }

        let result = self.exchange(&mut conn, msg_id);
        if let Err(err) = &result {
            conn.poisoned = true;
            warn!(msg_id, object = %target, operation, error = %err, "call failed; connection poisoned");
        }
        result
    }

    /// Call with a parameter block that is already encoded.
    ///
    /// The bytes are placed directly after the command header, so any
    /// alignment inside them must already be relative to the header start.
    pub fn call_raw(&self, target: ObjectKey, operation: u32, params: &[u8]) -> Result<Reply> {
        self.call_with(target, operation, |enc| Ok(enc.put_bytes(params)?))
    }

    /// Like [`call_with`](Self::call_with), but a nonzero status is an error.
    pub fn call<F>(&self, target: ObjectKey, operation: u32, params: F) -> Result<Reply>
    where
        F: FnOnce(&mut Encoder<'_>) -> Result<()>,
    {
        let reply = self.call_with(target, operation, params)?;
        if reply.is_success() {
            return Ok(reply);
        }
        debug!(
            object = %target,
            class = class::name(target.class_id()),
            operation,
            status = reply.status,
            protocol = status::is_protocol_error(reply.status),
            "remote call failed"
        );
        Err(OrbError::from_status(reply.status, target, operation))
    }

    /// Handle bound to one remote object.
    pub fn stub(&self, target: ObjectKey) -> Stub<'_, R, W> {
        Stub {
            client: self,
            target,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection<R, W>>> {
        let conn = self.conn.lock().map_err(|_| OrbError::Poisoned)?;
        if conn.poisoned {
            return Err(OrbError::Poisoned);
        }
        Ok(conn)
    }

    fn exchange(&self, conn: &mut Connection<R, W>, msg_id: u32) -> Result<Reply> {
        let Connection {
            reader,
            writer,
            command_buf,
            ..
        } = conn;

        writer
            .write_message(MessageType::Command, &[command_buf.filled()])
            .map_err(|err| self.classify(err))?;

        let header = reader
            .read_packet_header()
            .map_err(|err| self.classify(err))?;
        if header.msg_type != MessageType::Response {
            return Err(OrbError::UnexpectedMessage {
                expected: MessageType::Response.name(),
                got: header.msg_type.name(),
            });
        }
        let msg_size = header.msg_size as usize;
        if msg_size < RESPONSE_HEADER_SIZE {
            return Err(WireError::MalformedFrame(format!(
                "response message of {msg_size} bytes is shorter than its header"
            ))
            .into());
        }

        let mut frame = SeqBuffer::with_capacity(msg_size);
        reader
            .read_exact_into(&mut frame, msg_size)
            .map_err(|err| self.classify(err))?;
        let response = ResponseHeader::decode(&mut Decoder::new(&mut frame))?;
        if response.msg_id != msg_id {
            return Err(OrbError::MessageIdMismatch {
                expected: msg_id,
                got: response.msg_id,
            });
        }

        debug!(
            msg_id,
            status = response.status,
            payload_len = msg_size - RESPONSE_HEADER_SIZE,
            "received response"
        );
        Ok(Reply {
            msg_id,
            status: response.status,
            frame,
        })
    }

    fn classify(&self, err: WireError) -> OrbError {
        if err.is_timeout() {
            OrbError::Timeout(self.config.wire.read_timeout.unwrap_or(Duration::ZERO))
        } else {
            OrbError::Wire(err)
        }
    }
}

/// Client-side proxy bound to one remote object.
pub struct Stub<'a, R = Stream, W = Stream> {
    client: &'a Client<R, W>,
    target: ObjectKey,
}

impl<R, W> Clone for Stub<'_, R, W> {
    fn clone(&self) -> Self {
        Self {
            client: self.client,
            target: self.target,
        }
    }
}

impl<'a, R: Read, W: Write> Stub<'a, R, W> {
    pub fn new(client: &'a Client<R, W>, target: ObjectKey) -> Self {
        Self { client, target }
    }

    pub fn target(&self) -> ObjectKey {
        self.target
    }

    pub fn client(&self) -> &'a Client<R, W> {
        self.client
    }

    /// Invoke an operation that takes no parameters; nonzero status is an error.
    pub fn invoke(&self, operation: u32) -> Result<Reply> {
        self.client.call(self.target, operation, |_| Ok(()))
    }

    /// Invoke an operation with parameters; nonzero status is an error.
    pub fn invoke_with<F>(&self, operation: u32, params: F) -> Result<Reply>
    where
        F: FnOnce(&mut Encoder<'_>) -> Result<()>,
    {
        self.client.call(self.target, operation, params)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::Cursor;
    use std::os::unix::net::UnixStream;
    use std::sync::Arc;
    use std::thread;

    use cxorb_wire::PacketHeader;

    use super::*;
    use crate::object::{success, OperationTable, Skeleton};
    use crate::registry::ObjectRegistry;
    use crate::server::ObjectServer;

    struct Adder;

    const ADDER: ObjectKey = ObjectKey::new(class::APP, 2);

    fn spawn_server() -> (Client<UnixStream, UnixStream>, thread::JoinHandle<()>) {
        let table = Arc::new(
            OperationTable::new("adder")
                .with(0, |_: &Adder, params, reply| {
                    let a = params.get_i32()?;
                    let b = params.get_i32()?;
                    reply.put_i32(a + b)?;
                    success()
                })
                .with(1, |_: &Adder, params, reply| {
                    let flag = params.get_bool()?;
                    let wide = params.get_f64()?;
                    reply.put_bool(!flag)?;
                    reply.put_f64(wide * 2.0)?;
                    success()
                })
                .with(2, |_: &Adder, _params, _reply| Ok(5)),
        );
        let mut registry = ObjectRegistry::new();
        registry.register(ADDER, Skeleton::new(Adder, table)).unwrap();
        let server = ObjectServer::new(registry);

        let (server_side, client_side) = UnixStream::pair().unwrap();
        let handle = thread::spawn(move || {
            let reader = server_side.try_clone().unwrap();
            server.run_io(reader, server_side).unwrap();
        });
        let client = Client::new(client_side.try_clone().unwrap(), client_side);
        (client, handle)
    }

    #[test]
    fn call_decodes_reply() {
        let (client, server) = spawn_server();
        let mut reply = client
            .call(ADDER, 0, |enc| {
                enc.put_i32(40)?;
                enc.put_i32(2)?;
                Ok(())
            })
            .unwrap();
        assert_eq!(reply.decoder().get_i32().unwrap(), 42);

        drop(client);
        server.join().unwrap();
    }

    #[test]
    fn aligned_parameters_roundtrip() {
        let (client, server) = spawn_server();
        let stub = client.stub(ADDER);
        let mut reply = stub
            .invoke_with(1, |enc| {
                enc.put_bool(true)?;
                enc.put_f64(1.25)?;
                Ok(())
            })
            .unwrap();
        let mut dec = reply.decoder();
        assert!(!dec.get_bool().unwrap());
        assert_eq!(dec.get_f64().unwrap(), 2.5);

        drop(client);
        server.join().unwrap();
    }

    #[test]
    fn failure_status_maps_to_errors() {
        let (client, server) = spawn_server();

        let err = client.stub(ObjectKey::new(class::DIG_IN, 0)).invoke(0).unwrap_err();
        assert!(matches!(err, OrbError::UnknownTarget(_)));

        let err = client.stub(ADDER).invoke(77).unwrap_err();
        assert!(matches!(err, OrbError::UnknownOperation { operation: 77 }));

        let err = client.stub(ADDER).invoke(2).unwrap_err();
        assert!(matches!(err, OrbError::Remote { status: 5 }));

        // Short parameters are rejected remotely without closing the connection.
        let reply = client.call_raw(ADDER, 0, &[1, 0]).unwrap();
        assert_eq!(reply.status, status::PACKET_SIZE);
        assert!(reply.body().is_empty());

        assert!(!client.is_poisoned());
        drop(client);
        server.join().unwrap();
    }

    #[test]
    fn message_ids_are_unique_and_echoed() {
        let (client, server) = spawn_server();
        let first = client.call_raw(ADDER, 2, &[]).unwrap();
        let second = client.call_raw(ADDER, 2, &[]).unwrap();
        assert_ne!(first.msg_id, second.msg_id);
        assert_eq!(second.msg_id, first.msg_id + 1);

        drop(client);
        server.join().unwrap();
    }

    #[test]
    fn concurrent_calls_are_serialized() {
        let (client, server) = spawn_server();
        let client = Arc::new(client);

        let workers: Vec<_> = (0..4)
            .map(|n: i32| {
                let client = Arc::clone(&client);
                thread::spawn(move || {
                    for i in 0..25 {
                        let mut reply = client
                            .call(ADDER, 0, |enc| {
                                enc.put_i32(n * 1000)?;
                                enc.put_i32(i)?;
                                Ok(())
                            })
                            .unwrap();
                        assert_eq!(reply.decoder().get_i32().unwrap(), n * 1000 + i);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        drop(client);
        server.join().unwrap();
    }

    #[test]
    fn mismatched_response_id_poisons() {
        let mut canned = PacketHeader::response(8).to_bytes().to_vec();
        canned.extend_from_slice(&ResponseHeader::new(999, 0).to_bytes());
        let client = Client::new(Cursor::new(canned), Vec::new());

        let err = client.call_raw(ADDER, 0, &[]).unwrap_err();
        assert!(matches!(
            err,
            OrbError::MessageIdMismatch {
                expected: 1,
                got: 999
            }
        ));
        assert!(client.is_poisoned());
        assert!(matches!(
            client.call_raw(ADDER, 0, &[]),
            Err(OrbError::Poisoned)
        ));
    }

    #[test]
    fn command_response_is_unexpected() {
        let mut canned = PacketHeader::command(12).to_bytes().to_vec();
        canned.extend_from_slice(&[0u8; 12]);
        let client = Client::new(Cursor::new(canned), Vec::new());
        assert!(matches!(
            client.call_raw(ADDER, 0, &[]),
            Err(OrbError::UnexpectedMessage { .. })
        ));
    }

    #[test]
    fn oversized_parameters_fail_locally() {
        let client = Client::from_parts(
            PacketReader::new(Cursor::new(Vec::new())),
            PacketWriter::new(Vec::new()),
            ClientConfig {
                command_buffer_size: 16,
                ..ClientConfig::default()
            },
        );
        let err = client.call_raw(ADDER, 0, &[0u8; 8]).unwrap_err();
        assert!(matches!(
            err,
            OrbError::Wire(WireError::BufferOverflow { .. })
        ));
        assert!(!client.is_poisoned());
    }

    #[test]
    fn read_timeout_becomes_timeout_error() {
        let (client_side, _server_side) = UnixStream::pair().unwrap();
        let config = ClientConfig {
            wire: WireConfig {
                read_timeout: Some(Duration::from_millis(20)),
                ..WireConfig::default()
            },
            ..ClientConfig::default()
        };
        let stream = Stream::from(client_side);
        let client = Client::from_parts(
            PacketReader::for_stream(stream.try_clone().unwrap(), config.wire.clone()).unwrap(),
            PacketWriter::for_stream(stream, config.wire.clone()).unwrap(),
            config,
        );

        assert!(matches!(
            client.call_raw(ADDER, 0, &[]),
            Err(OrbError::Timeout(d)) if d == Duration::from_millis(20)
        ));
        assert!(client.is_poisoned());
    }
}
