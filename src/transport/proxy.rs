use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::dispatch::{DispatchFabric, Outbound};
use crate::protocol::frame::Direction;
use crate::transport::codec;
use crate::RelayError;

const READ_BUFFER_CAPACITY: usize = 8 * 1024;

/// Accepts the real game client and relays its session to the real server.
///
/// One session at a time: the game client is the only expected peer, and
/// the dispatch fabric's transport slot is per-session.
pub struct RelayServer {
    listener: TcpListener,
    remote: SocketAddr,
    fabric: Arc<DispatchFabric>,
}

impl RelayServer {
    /// Binds the local listener the game client will be pointed at.
    pub async fn bind(
        addr: SocketAddr,
        remote: SocketAddr,
        fabric: Arc<DispatchFabric>,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(local = %listener.local_addr()?, %remote, "relay listening");
        Ok(Self {
            listener,
            remote,
            fabric,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts one client, dials the real server and relays the session
    /// until either side closes.
    pub async fn serve_once(&self) -> crate::Result<()> {
        let (client, peer) = self.listener.accept().await?;
        tracing::info!(%peer, "client connected");
        let server = TcpStream::connect(self.remote).await?;
        run_session(client, server, Arc::clone(&self.fabric)).await
    }
}

/// Relays one client/server pair through the dispatch fabric.
///
/// Two read pumps (one per direction) reassemble frames and dispatch
/// them; a single writer task owns both write halves and drains both the
/// forwarded frames and any `send()` traffic from application code.
pub async fn run_session(
    client: TcpStream,
    server: TcpStream,
    fabric: Arc<DispatchFabric>,
) -> crate::Result<()> {
    let (client_read, client_write) = client.into_split();
    let (server_read, server_write) = server.into_split();

    let (out_tx, out_rx) = mpsc::unbounded_channel();
    fabric.attach_transport(out_tx.clone());

    let writer = tokio::spawn(write_loop(out_rx, client_write, server_write));

    let mut pumps: JoinSet<crate::Result<()>> = JoinSet::new();
    pumps.spawn(pump(
        client_read,
        Direction::ToServer,
        Arc::clone(&fabric),
        out_tx.clone(),
    ));
    pumps.spawn(pump(
        server_read,
        Direction::ToClient,
        Arc::clone(&fabric),
        out_tx,
    ));

    // The first pump to return ends the session; the other is torn down
    // with it.
    let result = match pumps.join_next().await {
        Some(Ok(result)) => result,
        Some(Err(join_error)) => {
            tracing::error!(error = %join_error, "session pump failed");
            Err(RelayError::ConnectionClosed)
        }
        None => Ok(()),
    };
    pumps.shutdown().await;

    // With every sender gone the writer drains what is already queued,
    // then exits; frames accepted before teardown still go out.
    fabric.detach_transport();
    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => tracing::debug!(%error, "writer closed with error"),
        Err(join_error) => tracing::error!(error = %join_error, "writer task failed"),
    }

    tracing::info!("session closed");
    result
}

/// Reads one direction's byte stream, dispatches every reassembled frame
/// and queues survivors for forwarding.
async fn pump(
    mut read: OwnedReadHalf,
    direction: Direction,
    fabric: Arc<DispatchFabric>,
    out_tx: mpsc::UnboundedSender<Outbound>,
) -> crate::Result<()> {
    let mut buf = BytesMut::with_capacity(READ_BUFFER_CAPACITY);
    loop {
        while let Some(frame) = codec::decode(direction, &mut buf) {
            let opcode = frame.opcode();
            match fabric.on_frame_arrived(frame) {
                Some(forward) => {
                    let direction = forward.direction();
                    let outbound = Outbound {
                        frame: forward,
                        direction,
                    };
                    if out_tx.send(outbound).is_err() {
                        return Err(RelayError::ConnectionClosed);
                    }
                }
                None => tracing::debug!(opcode, ?direction, "frame not forwarded"),
            }
        }

        if read.read_buf(&mut buf).await? == 0 {
            tracing::debug!(?direction, "peer closed the stream");
            return Ok(());
        }
    }
}

/// Routes queued frames to the matching write half, preserving per-
/// direction order.
async fn write_loop(
    mut out_rx: mpsc::UnboundedReceiver<Outbound>,
    mut client: OwnedWriteHalf,
    mut server: OwnedWriteHalf,
) -> crate::Result<()> {
    let mut wire = BytesMut::with_capacity(READ_BUFFER_CAPACITY);
    while let Some(outbound) = out_rx.recv().await {
        wire.clear();
        codec::encode(&outbound.frame, &mut wire);
        let stream = match outbound.direction {
            Direction::ToClient => &mut client,
            Direction::ToServer => &mut server,
        };
        stream.write_all(&wire).await?;
    }
    Ok(())
}
