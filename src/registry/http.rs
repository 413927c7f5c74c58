//! HTTP implementation of the backend registry.
//!
//! # Responsibilities
//! - Translate registry operations to the SLB member REST API
//! - Attach the session's bearer token and a request id to each call
//! - Map transport failures and status codes onto `RegistryError`
//!
//! # Design Decisions
//! - One HTTP request per operation, bounded by the client timeout
//! - No retries here; the control loop decides when to try again

use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use async_trait::async_trait;

use crate::inventory::NodeId;
use crate::registry::client::BackendRegistry;
use crate::registry::session::Session;
use crate::registry::types::{
    ActualBackend, BackendId, DesiredBackend, ListenerRef, RegistryError, RegistryResult,
};

/// Member entry as returned by the list endpoint. The registry may send
/// `null` or omit any field; those decode to empty values.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct MemberRecord {
    backend_id: Option<String>,
    server_id: Option<String>,
    port: Option<u16>,
    server_name: Option<String>,
    server_ip: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    weight: Option<u32>,
}

impl From<MemberRecord> for ActualBackend {
    fn from(rec: MemberRecord) -> Self {
        // A member without a server id matches no node and is deleted as stale.
        Self {
            backend_id: BackendId(rec.backend_id.unwrap_or_default()),
            node_id: NodeId(rec.server_id.unwrap_or_default()),
            address: rec.server_ip.unwrap_or_default(),
            port: rec.port.unwrap_or_default(),
            name: rec.server_name.unwrap_or_default(),
            kind: rec.kind.unwrap_or_default(),
            weight: rec.weight.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MemberList {
    data: Option<Vec<MemberRecord>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServerSpec<'a> {
    server_id: &'a str,
    port: u16,
    server_name: &'a str,
    server_ip: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    weight: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateMembers<'a> {
    slb_id: &'a str,
    listener_id: &'a str,
    servers: Vec<ServerSpec<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteMembers<'a> {
    backend_id_list: Vec<&'a str>,
}

/// Registry client speaking the SLB REST API.
#[derive(Debug, Clone)]
pub struct HttpRegistryClient {
    http: reqwest::Client,
    base_url: Url,
    session: Session,
    timeout: Duration,
}

impl HttpRegistryClient {
    /// Create a client. Every request is bounded by `timeout`.
    pub fn new(base_url: Url, session: Session, timeout: Duration) -> RegistryResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RegistryError::Unavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url,
            session,
            timeout,
        })
    }

    fn members_url(&self, listener: &ListenerRef) -> String {
        format!(
            "{}/slbs/{}/listeners/{}/members",
            self.base_url.as_str().trim_end_matches('/'),
            listener.load_balancer_id,
            listener.listener_id
        )
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: String,
        body: Option<&B>,
    ) -> RegistryResult<reqwest::Response> {
        let token = self.session.bearer().await?;
        let request_id = uuid::Uuid::new_v4().to_string();

        let mut req = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(token)
            .header("x-request-id", &request_id);
        if let Some(body) = body {
            req = req.json(body);
        }

        tracing::debug!(request_id = %request_id, method = %method, url = %url, "Registry request");

        let res = req.send().await.map_err(|e| self.transport_error(e))?;
        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }

        let text = res.text().await.unwrap_or_default();
        tracing::debug!(request_id = %request_id, status = %status, body = %text, "Registry request rejected");
        let err = status_error(status, &url, &text);
        if matches!(err, RegistryError::Unauthorized(_)) {
            // Revoked or rotated token: fetch a new one on the next call.
            self.session.invalidate().await;
        }
        Err(err)
    }

    fn transport_error(&self, err: reqwest::Error) -> RegistryError {
        if err.is_timeout() {
            RegistryError::Timeout(self.timeout)
        } else {
            RegistryError::Unavailable(err.to_string())
        }
    }
}

fn status_error(status: StatusCode, url: &str, body: &str) -> RegistryError {
    let detail = if body.is_empty() {
        format!("{} returned {}", url, status)
    } else {
        format!("{} returned {}: {}", url, status, body)
    };
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RegistryError::Unauthorized(detail),
        StatusCode::NOT_FOUND => RegistryError::NotFound(detail),
        StatusCode::CONFLICT => RegistryError::Conflict(detail),
        _ => RegistryError::Unavailable(detail),
    }
}

#[async_trait]
impl BackendRegistry for HttpRegistryClient {
    async fn list(&self, listener: &ListenerRef) -> RegistryResult<Vec<ActualBackend>> {
        let res = self
            .send::<()>(Method::GET, self.members_url(listener), None)
            .await?;
        let text = res
            .text()
            .await
            .map_err(|e| RegistryError::Unavailable(format!("failed to read member list: {}", e)))?;
        let list: MemberList = serde_json::from_str(&text)
            .map_err(|e| RegistryError::Decode(format!("member list: {}", e)))?;
        Ok(list
            .data
            .unwrap_or_default()
            .into_iter()
            .map(ActualBackend::from)
            .collect())
    }

    async fn create_batch(&self, listener: &ListenerRef, backends: &[DesiredBackend]) -> RegistryResult<()> {
        let body = CreateMembers {
            slb_id: &listener.load_balancer_id,
            listener_id: &listener.listener_id,
            servers: backends
                .iter()
                .map(|b| ServerSpec {
                    server_id: b.node_id.as_str(),
                    port: b.port,
                    server_name: &b.name,
                    server_ip: &b.address,
                    kind: &b.kind,
                    weight: b.weight,
                })
                .collect(),
        };
        self.send(Method::POST, self.members_url(listener), Some(&body))
            .await?;
        Ok(())
    }

    async fn delete_batch(&self, listener: &ListenerRef, backend_ids: &[BackendId]) -> RegistryResult<()> {
        let body = DeleteMembers {
            backend_id_list: backend_ids.iter().map(BackendId::as_str).collect(),
        };
        self.send(Method::DELETE, self.members_url(listener), Some(&body))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::session::TokenEndpoint;
    use crate::registry::types::{BACKEND_KIND_COMPUTE, DEFAULT_BACKEND_WEIGHT};
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MEMBERS: &str = "/api/v1/slbs/slb-1/listeners/lis-1/members";

    fn client(server: &MockServer) -> HttpRegistryClient {
        let base = format!("{}/api/v1/", server.uri()).parse().unwrap();
        HttpRegistryClient::new(base, Session::fixed("tok"), Duration::from_secs(2)).unwrap()
    }

    fn listener() -> ListenerRef {
        ListenerRef::new("slb-1", "lis-1", 30080)
    }

    #[tokio::test]
    async fn test_list_decodes_members() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(MEMBERS))
            .and(header("authorization", "Bearer tok"))
            .and(header_exists("x-request-id"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "code": "Success",
                "message": "",
                "data": [{
                    "backendId": "b-1",
                    "listenerId": "lis-1",
                    "serverId": "i-a",
                    "port": 30080,
                    "serverName": "node-a",
                    "serverIp": "10.0.0.1",
                    "type": "compute",
                    "weight": 10
                }]
            })))
            .mount(&server)
            .await;

        let backends = client(&server).list(&listener()).await.unwrap();
        assert_eq!(backends.len(), 1);
        assert_eq!(backends[0].backend_id, BackendId::new("b-1"));
        assert_eq!(backends[0].node_id, NodeId::from("i-a"));
        assert_eq!(backends[0].address, "10.0.0.1");
    }

    #[tokio::test]
    async fn test_list_missing_listener() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(MEMBERS))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server).list(&listener()).await.unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_bad_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(MEMBERS))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let err = client(&server).list(&listener()).await.unwrap_err();
        assert!(matches!(err, RegistryError::Decode(_)));
    }

    #[tokio::test]
    async fn test_create_sends_single_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MEMBERS))
            .and(body_json(serde_json::json!({
                "slbId": "slb-1",
                "listenerId": "lis-1",
                "servers": [
                    {"serverId": "i-a", "port": 30080, "serverName": "node-a",
                     "serverIp": "10.0.0.1", "type": "compute", "weight": 10},
                    {"serverId": "i-b", "port": 30080, "serverName": "node-b",
                     "serverIp": "10.0.0.2", "type": "compute", "weight": 10}
                ]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let batch: Vec<DesiredBackend> = [("i-a", "node-a", "10.0.0.1"), ("i-b", "node-b", "10.0.0.2")]
            .iter()
            .map(|(id, name, ip)| DesiredBackend {
                node_id: NodeId::from(*id),
                address: ip.to_string(),
                port: 30080,
                name: name.to_string(),
                kind: BACKEND_KIND_COMPUTE.to_string(),
                weight: DEFAULT_BACKEND_WEIGHT,
            })
            .collect();

        client(&server).create_batch(&listener(), &batch).await.unwrap();
    }

    #[tokio::test]
    async fn test_create_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MEMBERS))
            .respond_with(ResponseTemplate::new(409).set_body_string("duplicate server"))
            .mount(&server)
            .await;

        let err = client(&server).create_batch(&listener(), &[]).await.unwrap_err();
        match err {
            RegistryError::Conflict(detail) => assert!(detail.contains("duplicate server")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_sends_ids() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(MEMBERS))
            .and(body_json(serde_json::json!({"backendIdList": ["b-1", "b-2"]})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let ids = vec![BackendId::new("b-1"), BackendId::new("b-2")];
        client(&server).delete_batch(&listener(), &ids).await.unwrap();
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(MEMBERS))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(MEMBERS))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let c = client(&server);
        let err = c.delete_batch(&listener(), &[BackendId::new("b-1")]).await.unwrap_err();
        assert!(matches!(err, RegistryError::Unauthorized(_)));

        let err = c.list(&listener()).await.unwrap_err();
        assert!(matches!(err, RegistryError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_slow_registry_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(MEMBERS))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"data": []}))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let base = format!("{}/api/v1", server.uri()).parse().unwrap();
        let c = HttpRegistryClient::new(base, Session::fixed("tok"), Duration::from_millis(200)).unwrap();
        let err = c.list(&listener()).await.unwrap_err();
        assert!(matches!(err, RegistryError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_unreachable_registry() {
        let base = "http://127.0.0.1:1/api".parse().unwrap();
        let c = HttpRegistryClient::new(base, Session::fixed("tok"), Duration::from_secs(1)).unwrap();
        let err = c.list(&listener()).await.unwrap_err();
        assert!(matches!(err, RegistryError::Unavailable(_) | RegistryError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_list_null_data_is_empty_pool() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(MEMBERS))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"code": "Success", "data": null})),
            )
            .mount(&server)
            .await;

        let backends = client(&server).list(&listener()).await.unwrap();
        assert!(backends.is_empty());
    }

    #[tokio::test]
    async fn test_list_tolerates_missing_and_null_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(MEMBERS))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    {"backendId": "b-1", "serverIp": "10.0.0.1", "port": 80},
                    {"backendId": "b-2", "serverId": "i-b", "serverName": null, "type": null}
                ]
            })))
            .mount(&server)
            .await;

        let backends = client(&server).list(&listener()).await.unwrap();
        assert_eq!(backends.len(), 2);
        assert_eq!(backends[0].node_id, NodeId::from(""));
        assert_eq!(backends[0].address, "10.0.0.1");
        assert_eq!(backends[1].node_id, NodeId::from("i-b"));
        assert_eq!(backends[1].name, "");
        assert_eq!(backends[1].kind, "");
    }

    #[tokio::test]
    async fn test_decode_error_names_the_problem() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(MEMBERS))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"data": [{"port": "not-a-port"}]})),
            )
            .mount(&server)
            .await;

        match client(&server).list(&listener()).await.unwrap_err() {
            RegistryError::Decode(detail) => {
                assert!(detail.contains("member list"));
                assert!(detail.contains("line 1"), "{detail}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unauthorized_refetches_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access_token": "revoked", "expires_in": 3600})),
            )
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(MEMBERS))
            .and(header("authorization", "Bearer revoked"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let session = Session::from_endpoint(TokenEndpoint {
            url: format!("{}/token", server.uri()).parse().unwrap(),
            client_id: "lb-sync".to_string(),
            client_secret: "s3cret".to_string(),
            requested_subject: None,
            refresh_margin: Duration::from_secs(30),
            timeout: Duration::from_secs(2),
        })
        .unwrap();
        let base = format!("{}/api/v1", server.uri()).parse().unwrap();
        let c = HttpRegistryClient::new(base, session, Duration::from_secs(2)).unwrap();

        for _ in 0..2 {
            let err = c.list(&listener()).await.unwrap_err();
            assert!(matches!(err, RegistryError::Unauthorized(_)));
        }
    }
}
