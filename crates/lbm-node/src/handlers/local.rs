//! The stdin MCP-style request loop's method table (§6): `{id, method,
//! params}` in, `{id, result, error}` out, reusing the P2P wire envelope.
//! Distinct from [`lbm_p2p::dispatch::dispatch`] — every method here runs
//! with this node's own authority, with no caller identity to check.

use serde::Deserialize;
use serde_json::json;

use lbm_p2p::envelope::{Request, Response};
use lbm_types::errors::LbmError;
use lbm_types::{ErrorCode, MemberRole, PeerInfo, PolicyUpdate};

use crate::container::Node;

fn bad_params(id: String, e: serde_json::Error) -> Response {
    Response::err(id, ErrorCode::BadRequest, format!("bad params: {e}"))
}

fn to_value<T: serde::Serialize>(id: &str, v: &T) -> Response {
    match serde_json::to_value(v) {
        Ok(value) => Response::ok(id.to_string(), value),
        Err(e) => Response::err(id.to_string(), ErrorCode::Internal, format!("encoding error: {e}")),
    }
}

fn from_result<T: serde::Serialize>(id: String, r: Result<T, LbmError>) -> Response {
    match r {
        Ok(v) => to_value(&id, &v),
        Err(e) => Response::from_error(id, &e),
    }
}

fn now_ms() -> i64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

/// Run one locally-authored request through the admin method table.
pub async fn dispatch_local(node: &Node, req: Request) -> Response {
    macro_rules! parse_params {
        ($ty:ty) => {
            match serde_json::from_value::<$ty>(req.params.clone()) {
                Ok(p) => p,
                Err(e) => return bad_params(req.id, e),
            }
        };
    }

    match req.method.as_str() {
        "health" => to_value(&req.id, &lbm_p2p::ports::NodeOps::health(node).await),
        "node_info" => to_value(&req.id, &lbm_p2p::ports::NodeOps::node_info(node)),
        "list_groups" => Response::ok(req.id, json!(node.group_ids().await)),

        "create_group" => {
            #[derive(Deserialize)]
            struct Params {
                name: String,
                currency: String,
            }
            let p = parse_params!(Params);
            from_result(req.id, node.create_group(&p.name, &p.currency).await)
        }

        "member_add" => {
            #[derive(Deserialize)]
            struct Params {
                group_id: String,
                #[serde(rename = "pub")]
                pub_key: String,
                role: MemberRole,
            }
            let p = parse_params!(Params);
            from_result(req.id, node.member_add(&p.group_id, &p.pub_key, p.role).await)
        }

        "member_remove" => {
            #[derive(Deserialize)]
            struct Params {
                group_id: String,
                #[serde(rename = "pub")]
                pub_key: String,
            }
            let p = parse_params!(Params);
            from_result(req.id, node.member_remove(&p.group_id, &p.pub_key).await)
        }

        "mint" => {
            #[derive(Deserialize)]
            struct Params {
                group_id: String,
                to: String,
                amount: u64,
            }
            let p = parse_params!(Params);
            from_result(req.id, node.mint(&p.group_id, &p.to, p.amount).await)
        }

        "transfer" => {
            #[derive(Deserialize)]
            struct Params {
                group_id: String,
                to: String,
                amount: u64,
            }
            let p = parse_params!(Params);
            from_result(req.id, node.transfer(&p.group_id, &p.to, p.amount).await)
        }

        "policy_update" => {
            #[derive(Deserialize)]
            struct Params {
                group_id: String,
                updates: PolicyUpdate,
            }
            let p = parse_params!(Params);
            from_result(req.id, node.policy_update(&p.group_id, p.updates).await)
        }

        "put_claim_artifact" => {
            #[derive(Deserialize)]
            struct Params {
                group_id: String,
                text: String,
                #[serde(default)]
                tags: Vec<String>,
            }
            let p = parse_params!(Params);
            from_result(req.id, node.put_claim_artifact(&p.group_id, &p.text, p.tags))
        }

        "claim" => {
            #[derive(Deserialize)]
            struct Params {
                group_id: String,
                artifact_hash: String,
            }
            let p = parse_params!(Params);
            from_result(req.id, node.claim(&p.group_id, &p.artifact_hash).await)
        }

        "retract" => {
            #[derive(Deserialize)]
            struct Params {
                group_id: String,
                artifact_hash: String,
            }
            let p = parse_params!(Params);
            from_result(req.id, node.retract(&p.group_id, &p.artifact_hash).await)
        }

        "search_claims" => {
            #[derive(Deserialize)]
            struct Params {
                group_id: String,
                query: String,
                #[serde(default = "default_limit")]
                limit: usize,
                #[serde(default)]
                include_retracted: bool,
            }
            fn default_limit() -> usize {
                10
            }
            let p = parse_params!(Params);
            from_result(req.id, node.search_claims(&p.group_id, &p.query, p.limit, p.include_retracted).await)
        }

        "put_package_artifact" => {
            #[derive(Deserialize)]
            struct Params {
                group_id: String,
                data_b64: String,
            }
            let p = parse_params!(Params);
            use base64::Engine;
            match base64::engine::general_purpose::STANDARD.decode(&p.data_b64) {
                Ok(bytes) => from_result(req.id, node.put_package_artifact(&p.group_id, &bytes)),
                Err(e) => Response::err(req.id, ErrorCode::BadRequest, format!("bad base64: {e}")),
            }
        }

        "offer_create" => {
            #[derive(Deserialize)]
            struct Params {
                group_id: String,
                offer_id: String,
                title: String,
                price: u64,
                #[serde(default)]
                tags: Vec<String>,
                package_hash: String,
            }
            let p = parse_params!(Params);
            from_result(req.id, node.offer_create(&p.group_id, &p.offer_id, &p.title, p.price, p.tags, &p.package_hash).await)
        }

        "offer_close" => {
            #[derive(Deserialize)]
            struct Params {
                group_id: String,
                offer_id: String,
            }
            let p = parse_params!(Params);
            from_result(req.id, node.offer_close(&p.group_id, &p.offer_id).await)
        }

        "offer_purchase" => {
            #[derive(Deserialize)]
            struct Params {
                group_id: String,
                offer_id: String,
            }
            let p = parse_params!(Params);
            from_result(req.id, node.offer_purchase(&p.group_id, &p.offer_id).await)
        }

        "remember_peer" => {
            #[derive(Deserialize)]
            struct Params {
                host: String,
                port: u16,
                #[serde(default)]
                alias: Option<String>,
            }
            let p = parse_params!(Params);
            let info = PeerInfo {
                node_id: None,
                sign_pub: None,
                enc_pub: None,
                alias: p.alias,
                last_seen_ms: None,
                last_error: None,
                added_ms: now_ms(),
            };
            from_result(req.id, node.remember_peer(&p.host, p.port, info))
        }

        "list_peers" => Response::ok(req.id, json!(node.list_peers())),

        "subscribe" => {
            #[derive(Deserialize)]
            struct Params {
                group_id: String,
                peer_host: String,
                peer_port: u16,
                sync_interval_s: u64,
            }
            let p = parse_params!(Params);
            from_result(req.id, node.subscribe(&p.group_id, &p.peer_host, p.peer_port, p.sync_interval_s))
        }

        "unsubscribe" => {
            #[derive(Deserialize)]
            struct Params {
                group_id: String,
            }
            let p = parse_params!(Params);
            from_result(req.id, node.unsubscribe(&p.group_id))
        }

        "list_subscriptions" => Response::ok(req.id, json!(node.list_subscriptions())),

        "sync_group" => {
            #[derive(Deserialize)]
            struct Params {
                group_id: String,
                peer_host: String,
                peer_port: u16,
            }
            let p = parse_params!(Params);
            from_result(req.id, node.sync_group(&p.group_id, &p.peer_host, p.peer_port).await)
        }

        other => Response::err(req.id, ErrorCode::BadRequest, format!("unknown method: {other}")),
    }
}
