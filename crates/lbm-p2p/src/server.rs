//! The TCP accept loop: per-IP admission, handshake, then a framed
//! request/response loop over a [`SecureSession`] (§4.6, §5).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use lbm_channel::{read_frame, server_handshake, write_frame, SecureSession, DEFAULT_MAX_FRAME_BYTES};
use lbm_crypto::agreement::X25519KeyPair;
use lbm_crypto::signatures::Ed25519KeyPair;
use lbm_ratelimit::{ConnectionLimiter, RequestLimiter};

use crate::dispatch::{dispatch, CallerContext};
use crate::error::P2pError;
use crate::ports::NodeOps;

/// How long a connection has to complete its handshake before it's dropped.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);
/// How long a single request has to produce a response before the
/// connection is dropped.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Listens for inbound connections and dispatches every framed request on
/// them to a [`NodeOps`] implementation.
pub struct P2pServer<O: NodeOps + 'static> {
    ops: Arc<O>,
    sign_key: Ed25519KeyPair,
    enc_key: X25519KeyPair,
    connections: Arc<ConnectionLimiter>,
    requests: Arc<RequestLimiter>,
    max_frame_bytes: usize,
}

impl<O: NodeOps + 'static> P2pServer<O> {
    /// Build a server bound to the given identity and operations handle,
    /// using default connection/request rate limits.
    pub fn new(ops: Arc<O>, sign_key: Ed25519KeyPair, enc_key: X25519KeyPair) -> Self {
        Self {
            ops,
            sign_key,
            enc_key,
            connections: Arc::new(ConnectionLimiter::with_defaults()),
            requests: Arc::new(RequestLimiter::with_defaults()),
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }

    /// Accept connections on `bind_addr` until the process is torn down.
    /// Each connection is handled on its own task; one peer's slow or
    /// misbehaving connection never blocks another's.
    pub async fn serve(self: Arc<Self>, bind_addr: &str) -> Result<(), P2pError> {
        let listener = TcpListener::bind(bind_addr).await?;
        info!(addr = %bind_addr, "p2p server listening");

        loop {
            let (stream, peer_addr) = listener.accept().await?;
            let server = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = server.handle_connection(stream, peer_addr).await {
                    warn!(peer = %peer_addr, error = %e, "connection ended");
                }
            });
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream, peer_addr: SocketAddr) -> Result<(), P2pError> {
        let _guard = self.connections.acquire(peer_addr.ip())?;

        let mut session = tokio::time::timeout(
            HANDSHAKE_TIMEOUT,
            server_handshake(&mut stream, &self.sign_key, &self.enc_key),
        )
        .await
        .map_err(|_| P2pError::HandshakeTimeout)??;

        let caller = CallerContext { sign_pub: session.peer_sign_pub.clone() };
        info!(peer = %peer_addr, sign_pub = %caller.sign_pub, "handshake complete");

        loop {
            let frame = match read_frame(&mut stream, self.max_frame_bytes).await {
                Ok(f) => f,
                Err(lbm_channel::ChannelError::Io(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            };

            let result = tokio::time::timeout(REQUEST_TIMEOUT, self.handle_request(&mut session, &caller, &frame)).await;
            let response_bytes = match result {
                Ok(r) => r?,
                Err(_) => return Err(P2pError::HandshakeTimeout),
            };
            write_frame(&mut stream, &response_bytes).await?;
        }
    }

    async fn handle_request(
        &self,
        session: &mut SecureSession,
        caller: &CallerContext,
        frame: &[u8],
    ) -> Result<Vec<u8>, P2pError> {
        let request = session.open(frame)?;
        let response = dispatch(self.ops.as_ref(), &self.requests, caller, request).await;
        Ok(session.seal(&response)?)
    }
}
