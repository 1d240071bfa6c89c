//! Outbound connection helper: connect, handshake, then send requests and
//! read their matching response. Used by group synchronization and by
//! anything else that needs to call another node.

use tokio::net::TcpStream;

use lbm_channel::{client_handshake, read_frame, write_frame, SecureSession, DEFAULT_MAX_FRAME_BYTES};
use lbm_crypto::agreement::X25519KeyPair;
use lbm_crypto::signatures::Ed25519KeyPair;

use crate::envelope::{Request, Response};
use crate::error::P2pError;

/// A single outbound connection to one peer, after a completed handshake.
/// One request is in flight at a time — callers that need concurrency open
/// multiple clients.
pub struct P2pClient {
    stream: TcpStream,
    session: SecureSession,
    max_frame_bytes: usize,
    next_id: u64,
}

impl P2pClient {
    /// Connect to `addr` and run the client side of the handshake,
    /// identifying this node with `sign_key`/`enc_key`.
    pub async fn connect(addr: &str, sign_key: &Ed25519KeyPair, enc_key: &X25519KeyPair) -> Result<Self, P2pError> {
        let mut stream = TcpStream::connect(addr).await?;
        let session = client_handshake(&mut stream, sign_key, enc_key).await?;
        Ok(Self { stream, session, max_frame_bytes: DEFAULT_MAX_FRAME_BYTES, next_id: 0 })
    }

    /// The peer's signing public key (base64), established by the handshake.
    pub fn peer_sign_pub(&self) -> &str {
        &self.session.peer_sign_pub
    }

    /// Call `method` with `params`, waiting for the matching response.
    pub async fn call(&mut self, method: &str, params: serde_json::Value) -> Result<Response, P2pError> {
        let id = self.next_id;
        self.next_id += 1;
        let request = Request { id: id.to_string(), method: method.to_string(), params };

        let sealed = self.session.seal(&request)?;
        write_frame(&mut self.stream, &sealed).await?;

        let frame = read_frame(&mut self.stream, self.max_frame_bytes).await?;
        let response: Response = self.session.open(&frame)?;
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{dispatch, CallerContext};
    use crate::ports::{HealthInfo, NodeInfo, NodeOps, OfferAnnouncement};
    use lbm_chain::ChainSnapshot;
    use lbm_ratelimit::RequestLimiter;
    use lbm_types::{Block, LbmError};
    use std::collections::BTreeSet;

    struct EchoOps;

    #[async_trait::async_trait]
    impl NodeOps for EchoOps {
        async fn health(&self) -> HealthInfo {
            HealthInfo { status: "ok".into(), uptime_s: 0, group_count: 0 }
        }
        fn node_info(&self) -> NodeInfo {
            NodeInfo { node_id: "n".into(), sign_pub: "sp".into(), enc_pub: "ep".into(), version: "0.1.0".into() }
        }
        async fn group_ids(&self) -> Vec<String> {
            vec![]
        }
        async fn member_groups(&self, _sign_pub: &str) -> BTreeSet<String> {
            BTreeSet::new()
        }
        async fn get_chain(&self, group_id: &str) -> Result<ChainSnapshot, LbmError> {
            Err(LbmError::NotFound(group_id.to_string()))
        }
        async fn get_block(&self, _group_id: &str, _height: u64) -> Result<Block, LbmError> {
            Err(LbmError::NotFound("no block".into()))
        }
        async fn cas_get(&self, _hash: &str) -> Result<Vec<u8>, LbmError> {
            Ok(vec![])
        }
        fn cas_is_visible(&self, _hash: &str, _groups: &BTreeSet<String>) -> bool {
            true
        }
        async fn market_announce_offers(
            &self,
            _from_sign_pub: &str,
            _offers: Vec<OfferAnnouncement>,
        ) -> Result<(), LbmError> {
            Ok(())
        }
        async fn market_list_offers(&self) -> Vec<OfferAnnouncement> {
            vec![]
        }
        async fn purchase(
            &self,
            _offer_id: &str,
            _buyer_pub: &str,
            _payment_proof: serde_json::Value,
        ) -> Result<(), LbmError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn connect_and_ping_over_a_real_socket() {
        let server_sign = Ed25519KeyPair::generate();
        let server_enc = X25519KeyPair::generate();
        let client_sign = Ed25519KeyPair::generate();
        let client_enc = X25519KeyPair::generate();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server_task = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut session = lbm_channel::server_handshake(&mut stream, &server_sign, &server_enc)
                .await
                .unwrap();
            let frame = read_frame(&mut stream, DEFAULT_MAX_FRAME_BYTES).await.unwrap();
            let request: Request = session.open(&frame).unwrap();
            let ops = EchoOps;
            let limiter = RequestLimiter::with_defaults();
            let caller = CallerContext { sign_pub: session.peer_sign_pub.clone() };
            let response = dispatch(&ops, &limiter, &caller, request).await;
            let sealed = session.seal(&response).unwrap();
            write_frame(&mut stream, &sealed).await.unwrap();
        });

        let mut client = P2pClient::connect(&addr.to_string(), &client_sign, &client_enc).await.unwrap();
        let response = client.call("ping", serde_json::json!({})).await.unwrap();
        assert!(response.error.is_none());
        assert_eq!(response.result.unwrap()["pong"], true);

        server_task.await.unwrap();
    }
}
