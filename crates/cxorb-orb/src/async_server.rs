//! Tokio accept loop built on [`PacketCodec`].
//!
//! Behaves like [`ObjectServer::serve`] but drives each connection as a
//! task over `Framed<TcpStream, PacketCodec>`. Dispatch itself stays
//! synchronous: handlers run inline on the connection task.

use std::future::Future;

use cxorb_transport::TransportError;
use cxorb_wire::{
    status, CommandHeader, MessageType, Packet, PacketCodec, ResponseHeader, SeqBuffer,
    COMMAND_HEADER_SIZE, RESPONSE_HEADER_SIZE,
};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, warn};

use crate::dispatcher::DispatchSummary;
use crate::error::Result;
use crate::server::{accept_io_retry_delay, ObjectServer};

impl ObjectServer {
    /// Accept TCP connections until `shutdown` resolves or the stop handle
    /// is set, spawning one task per connection.
    pub async fn serve_async<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(objects = self.registry().len(), "serving objects (async)");
        tokio::pin!(shutdown);

        loop {
            let (socket, addr) = tokio::select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => match accept_io_retry_delay(&err) {
                        Some(delay) => {
                            warn!(error = %err, retry_in = ?delay, "accept failed");
                            if !delay.is_zero() {
                                tokio::time::sleep(delay).await;
                            }
                            continue;
                        }
                        None => {
                            error!(error = %err, "accept failed, stopping server");
                            return Err(TransportError::Accept(err).into());
                        }
                    },
                },
            };
            if self.stop_handle().is_stopped() {
                break;
            }
            let _ = socket.set_nodelay(true);

            info!(peer = %addr, "connection accepted");
            let server = self.clone();
            tokio::spawn(async move {
                match server.run_framed(socket).await {
                    Ok(summary) => info!(
                        peer = %addr,
                        commands = summary.commands,
                        failures = summary.failures,
                        "connection closed"
                    ),
                    Err(err) => warn!(peer = %addr, error = %err, "connection ended with error"),
                }
            });
        }
        debug!("async server stopped");
        Ok(())
    }

    /// Serve one connection over any async byte stream.
    pub async fn run_framed<T>(&self, io: T) -> Result<DispatchSummary>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let codec = PacketCodec::new(self.config().wire.max_message_size);
        let mut framed = Framed::new(io, codec);
        let mut reply =
            SeqBuffer::with_capacity(self.config().reply_buffer_size.max(RESPONSE_HEADER_SIZE));
        let command_limit = self.config().command_buffer_size.max(COMMAND_HEADER_SIZE);
        let mut summary = DispatchSummary::default();
        let stop = self.stop_handle();

        while let Some(packet) = framed.next().await {
            let packet = packet?;
            if packet.header.msg_type != MessageType::Command {
                warn!(msg_type = packet.header.msg_type.name(), "ignoring non-command packet");
                summary.ignored += 1;
                continue;
            }

            CommandHeader::check_message_size(packet.body.len())?;
            let response = if packet.body.len() > command_limit {
                let (command, params) = packet.split_command()?;
                warn!(
                    msg_id = command.msg_id,
                    object = %command.target,
                    payload_len = params.len(),
                    "parameter block exceeds command buffer"
                );
                Packet::response(&ResponseHeader::new(command.msg_id, status::PACKET_SIZE), &[])?
            } else {
                let mut frame = SeqBuffer::from_slice(&packet.body);
                let (_, header) = self.registry().dispatch_frame(&mut frame, &mut reply)?;
                Packet::response(&header, &reply.filled()[RESPONSE_HEADER_SIZE..])?
            };

            let (header, _) = response.split_response()?;
            framed.send(response).await?;
            summary.commands += 1;
            if header.status != status::SUCCESS {
                summary.failures += 1;
            }
            if stop.is_stopped() {
                debug!("stop requested");
                break;
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cxorb_wire::{class, ObjectKey, WireError};

    use crate::error::OrbError;
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    use super::*;
    use crate::object::{success, OperationTable, Skeleton};
    use crate::registry::ObjectRegistry;

    struct Squarer;

    const KEY: ObjectKey = ObjectKey::new(class::APP, 3);

    fn server() -> ObjectServer {
        let table = Arc::new(OperationTable::new("squarer").with(0, |_: &Squarer, params, reply| {
            let n = params.get_i64()?;
            reply.put_i64(n * n)?;
            success()
        }));
        let mut registry = ObjectRegistry::new();
        registry.register(KEY, Skeleton::new(Squarer, table)).unwrap();
        ObjectServer::new(registry)
    }

    fn command(msg_id: u32, operation: u32, value: i64) -> Packet {
        // i64 after the 12-byte command header aligns to offset 16.
        let mut params = vec![0u8; 4];
        params.extend_from_slice(&value.to_le_bytes());
        Packet::command(&CommandHeader::new(msg_id, KEY, operation), &params).unwrap()
    }

    #[tokio::test]
    async fn framed_connection_over_duplex() {
        let (client, server_io) = tokio::io::duplex(1024);
        let server = server();
        let task = tokio::spawn(async move { server.run_framed(server_io).await });

        let mut framed = Framed::new(client, PacketCodec::default());
        framed.send(command(1, 0, -9)).await.unwrap();
        let (header, payload) = framed.next().await.unwrap().unwrap().split_response().unwrap();
        assert_eq!(header, ResponseHeader::new(1, status::SUCCESS));
        assert_eq!(payload.as_ref(), &81i64.to_le_bytes());

        framed.send(command(2, 5, 0)).await.unwrap();
        let (header, payload) = framed.next().await.unwrap().unwrap().split_response().unwrap();
        assert_eq!(header.status, status::UNKNOWN_CMD);
        assert!(payload.is_empty());

        drop(framed);
        let summary = task.await.unwrap().unwrap();
        assert_eq!(summary.commands, 2);
        assert_eq!(summary.failures, 1);
    }

    #[tokio::test]
    async fn command_shorter_than_its_header_ends_connection() {
        let (client, server_io) = tokio::io::duplex(1024);
        let server = server();
        let task = tokio::spawn(async move { server.run_framed(server_io).await });

        let mut framed = Framed::new(client, PacketCodec::default());
        framed
            .send(Packet::new(MessageType::Command, vec![0u8; 5]).unwrap())
            .await
            .unwrap();

        let result = task.await.unwrap();
        assert!(matches!(
            result,
            Err(OrbError::Wire(WireError::MalformedFrame(_)))
        ));
    }

    #[tokio::test]
    async fn tcp_accept_loop_stops_on_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let server = server();
        let serving = tokio::spawn(async move {
            server
                .serve_async(listener, async {
                    let _ = rx.await;
                })
                .await
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut framed = Framed::new(stream, PacketCodec::default());
        framed.send(command(7, 0, 12)).await.unwrap();
        let (header, payload) = framed.next().await.unwrap().unwrap().split_response().unwrap();
        assert_eq!(header.msg_id, 7);
        assert_eq!(payload.as_ref(), &144i64.to_le_bytes());

        tx.send(()).unwrap();
        serving.await.unwrap().unwrap();
    }
}
