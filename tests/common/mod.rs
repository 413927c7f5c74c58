//! Shared utilities for integration testing.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use wiremock::matchers::path;
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const ANNOTATION: &str = "loadbalancer.io/instance-id";

#[derive(Default)]
struct SlbState {
    members: Vec<Value>,
    next_id: u64,
    requests: Vec<String>,
    fail_next: HashMap<String, u16>,
}

/// A stateful stand-in for one SLB listener's member API.
#[derive(Clone, Default)]
pub struct FakeSlb {
    state: Arc<Mutex<SlbState>>,
}

impl FakeSlb {
    /// Mount the member endpoints for `slb/listener` on a fresh mock server.
    pub async fn start(slb: &str, listener: &str) -> (MockServer, Self) {
        let server = MockServer::start().await;
        let fake = FakeSlb::default();
        Mock::given(path(format!("/api/v1/slbs/{}/listeners/{}/members", slb, listener)))
            .respond_with(fake.clone())
            .mount(&server)
            .await;
        (server, fake)
    }

    /// HTTP methods received, oldest first.
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.state.lock().unwrap().requests.clear();
    }

    /// `(serverId, serverIp)` of every registered member.
    pub fn members(&self) -> Vec<(String, String)> {
        self.state
            .lock()
            .unwrap()
            .members
            .iter()
            .map(|m| {
                (
                    m["serverId"].as_str().unwrap_or_default().to_string(),
                    m["serverIp"].as_str().unwrap_or_default().to_string(),
                )
            })
            .collect()
    }

    /// Answer the next request with `method` using `status`.
    pub fn fail_next(&self, method: &str, status: u16) {
        self.state
            .lock()
            .unwrap()
            .fail_next
            .insert(method.to_string(), status);
    }
}

impl Respond for FakeSlb {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut state = self.state.lock().unwrap();
        let method = request.method.as_str().to_string();
        state.requests.push(method.clone());

        if let Some(status) = state.fail_next.remove(&method) {
            return ResponseTemplate::new(status);
        }

        match method.as_str() {
            "GET" => ResponseTemplate::new(200).set_body_json(json!({
                "code": "Success",
                "message": "",
                "data": state.members,
            })),
            "POST" => {
                let body: Value = serde_json::from_slice(&request.body).unwrap_or_default();
                let servers = body["servers"].as_array().cloned().unwrap_or_default();
                for mut server in servers {
                    state.next_id += 1;
                    server["backendId"] = json!(format!("bk-{}", state.next_id));
                    state.members.push(server);
                }
                ResponseTemplate::new(200).set_body_json(json!({"code": "Success"}))
            }
            "DELETE" => {
                let body: Value = serde_json::from_slice(&request.body).unwrap_or_default();
                let ids: Vec<String> = body["backendIdList"]
                    .as_array()
                    .map(|ids| {
                        ids.iter()
                            .filter_map(|id| id.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();
                state
                    .members
                    .retain(|m| !ids.iter().any(|id| m["backendId"] == json!(id)));
                ResponseTemplate::new(204)
            }
            _ => ResponseTemplate::new(405),
        }
    }
}

/// A Ready node in `kubectl get nodes -o json` form.
pub fn kube_node(name: &str, instance_id: &str, internal_ip: &str) -> Value {
    json!({
        "metadata": {
            "name": name,
            "annotations": { ANNOTATION: instance_id }
        },
        "spec": {},
        "status": {
            "addresses": [
                {"type": "Hostname", "address": name},
                {"type": "InternalIP", "address": internal_ip}
            ],
            "conditions": [{"type": "Ready", "status": "True"}]
        }
    })
}

/// Write a `NodeList` document to `path`.
pub fn write_node_list(path: &Path, nodes: &[Value]) {
    let doc = json!({"apiVersion": "v1", "kind": "NodeList", "items": nodes});
    std::fs::write(path, serde_json::to_vec_pretty(&doc).unwrap()).unwrap();
}
