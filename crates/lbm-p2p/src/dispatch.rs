//! Request dispatch (§4.6): admission, authorization, execution, in that
//! order, for every method in the stable list.

use serde::Deserialize;
use serde_json::json;

use lbm_ratelimit::RequestLimiter;
use lbm_types::{ErrorCode, LbmError};

use crate::envelope::{Request, Response};
use crate::ports::{NodeOps, OfferAnnouncement};

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// The authenticated identity of the caller on this connection, established
/// once by the handshake and reused for every request on it.
#[derive(Debug, Clone)]
pub struct CallerContext {
    /// Peer's long-lived Ed25519 signing public key (base64), verified
    /// during the handshake.
    pub sign_pub: String,
}

fn bad_params(id: String, e: serde_json::Error) -> Response {
    Response::err(id, ErrorCode::BadRequest, format!("bad params: {e}"))
}

fn to_value<T: serde::Serialize>(id: &str, v: &T) -> Response {
    match serde_json::to_value(v) {
        Ok(value) => Response::ok(id.to_string(), value),
        Err(e) => Response::err(id.to_string(), ErrorCode::Internal, format!("encoding error: {e}")),
    }
}

/// Run one request through admission, authorization, and execution,
/// returning the response envelope to send back. Never panics and never
/// returns an `Err` — every failure is folded into the response.
pub async fn dispatch(ops: &dyn NodeOps, limiter: &RequestLimiter, caller: &CallerContext, req: Request) -> Response {
    if let Err(e) = limiter.check(&caller.sign_pub, now_ms()) {
        let lbm: LbmError = e.into();
        return Response::from_error(req.id, &lbm);
    }

    match req.method.as_str() {
        "ping" => Response::ok(req.id, json!({"pong": true, "ts_ms": now_ms()})),

        "health" => {
            let info = ops.health().await;
            to_value(&req.id, &info)
        }

        "node_info" => to_value(&req.id, &ops.node_info()),

        "list_groups" => {
            let groups = ops.member_groups(&caller.sign_pub).await;
            Response::ok(req.id, json!(groups))
        }

        "get_chain" => {
            #[derive(Deserialize)]
            struct Params {
                group_id: String,
            }
            let params: Params = match serde_json::from_value(req.params) {
                Ok(p) => p,
                Err(e) => return bad_params(req.id, e),
            };
            let groups = ops.member_groups(&caller.sign_pub).await;
            if !groups.contains(&params.group_id) {
                return Response::err(req.id, ErrorCode::Forbidden, "not a member of this group");
            }
            match ops.get_chain(&params.group_id).await {
                Ok(snapshot) => to_value(&req.id, &snapshot),
                Err(e) => Response::from_error(req.id, &e),
            }
        }

        "get_block" => {
            #[derive(Deserialize)]
            struct Params {
                group_id: String,
                height: u64,
            }
            let params: Params = match serde_json::from_value(req.params) {
                Ok(p) => p,
                Err(e) => return bad_params(req.id, e),
            };
            let groups = ops.member_groups(&caller.sign_pub).await;
            if !groups.contains(&params.group_id) {
                return Response::err(req.id, ErrorCode::Forbidden, "not a member of this group");
            }
            match ops.get_block(&params.group_id, params.height).await {
                Ok(block) => to_value(&req.id, &block),
                Err(e) => Response::from_error(req.id, &e),
            }
        }

        "cas_get" => {
            #[derive(Deserialize)]
            struct Params {
                hash: String,
            }
            let params: Params = match serde_json::from_value(req.params) {
                Ok(p) => p,
                Err(e) => return bad_params(req.id, e),
            };
            let groups = ops.member_groups(&caller.sign_pub).await;
            if !ops.cas_is_visible(&params.hash, &groups) {
                return Response::err(req.id, ErrorCode::Forbidden, "object not visible to this peer");
            }
            match ops.cas_get(&params.hash).await {
                Ok(bytes) => {
                    use base64::Engine;
                    let b64 = base64::engine::general_purpose::STANDARD.encode(bytes);
                    Response::ok(req.id, json!({"data_b64": b64}))
                }
                Err(e) => Response::from_error(req.id, &e),
            }
        }

        "market_announce_offers" => {
            #[derive(Deserialize)]
            struct Params {
                offers: Vec<OfferAnnouncement>,
            }
            let params: Params = match serde_json::from_value(req.params) {
                Ok(p) => p,
                Err(e) => return bad_params(req.id, e),
            };
            match ops.market_announce_offers(&caller.sign_pub, params.offers).await {
                Ok(()) => Response::ok(req.id, json!({"accepted": true})),
                Err(e) => Response::from_error(req.id, &e),
            }
        }

        "market_list_offers" => {
            let offers = ops.market_list_offers().await;
            Response::ok(req.id, json!(offers))
        }

        "purchase" => {
            #[derive(Deserialize)]
            struct Params {
                offer_id: String,
                buyer_pub: String,
                payment_proof: serde_json::Value,
            }
            let params: Params = match serde_json::from_value(req.params) {
                Ok(p) => p,
                Err(e) => return bad_params(req.id, e),
            };
            if caller.sign_pub != params.buyer_pub {
                return Response::err(req.id, ErrorCode::Forbidden, "payment_proof must be submitted by the buyer");
            }
            match ops.purchase(&params.offer_id, &params.buyer_pub, params.payment_proof).await {
                Ok(()) => Response::ok(req.id, json!({"purchased": true})),
                Err(e) => Response::from_error(req.id, &e),
            }
        }

        other => Response::err(req.id, ErrorCode::BadRequest, format!("unknown method: {other}")),
    }
}
