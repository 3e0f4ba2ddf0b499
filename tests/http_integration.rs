//! Integration tests for discovery and request routing using wiremock
//!
//! These tests run the client against a mocked API server, covering discovery,
//! address conventions on the wire, error mapping and capability negotiation.

use kubeclient::api::http::HttpTransport;
use kubeclient::resource::capability::{default_factories, Capability, CapabilityKind, TriggerMode};
use kubeclient::resource::catalog::CatalogBuilder;
use kubeclient::resource::discovery::{ResourceListDocument, SurfaceVersion};
use kubeclient::resource::{Request, RequestRouter, Resource, ResourceIdentity, TypeCatalog, Verb};
use kubeclient::{ApiClient, Config, Error};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{any, bearer_token, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_get(server: &MockServer, at: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mount every discovery document except `/api`
async fn mount_discovery_without_legacy_root(server: &MockServer) {
    mount_get(
        server,
        "/api/v1",
        json!({"resources": [
            {"name": "pods", "kind": "Pod", "namespaced": true, "verbs": ["get", "list", "create", "delete"]},
            {"name": "pods/log", "kind": "Pod", "namespaced": true, "verbs": ["get"]},
            {"name": "namespaces", "kind": "Namespace", "namespaced": false, "verbs": ["get", "list"]}
        ]}),
    )
    .await;
    mount_get(server, "/oapi", json!({"versions": ["v1"]})).await;
    mount_get(
        server,
        "/oapi/v1",
        json!({"resources": [
            {"name": "projects", "kind": "Project", "namespaced": false, "verbs": ["get", "list"]},
            {"name": "projectrequests", "kind": "ProjectRequest", "namespaced": false, "verbs": ["create", "list"]},
            {"name": "deploymentconfigs/instantiate", "kind": "DeploymentRequest", "namespaced": true, "verbs": ["create"]},
            {"name": "deploymentconfigs", "kind": "DeploymentConfig", "namespaced": true, "verbs": ["get", "list"]}
        ]}),
    )
    .await;
    mount_get(
        server,
        "/apis",
        json!({"groups": [
            {"name": "apps",
             "versions": [{"groupVersion": "apps/v1", "version": "v1"}],
             "preferredVersion": {"groupVersion": "apps/v1", "version": "v1"}},
            {"name": "batch",
             "versions": [{"groupVersion": "batch/v1", "version": "v1"}],
             "preferredVersion": {"groupVersion": "batch/v1", "version": "v1"}}
        ]}),
    )
    .await;
    mount_get(
        server,
        "/apis/apps/v1",
        json!({"resources": [
            {"name": "deployments", "kind": "Deployment", "namespaced": true, "verbs": ["get", "list", "delete"]},
            {"name": "deployments/scale", "kind": "Scale", "group": "autoscaling", "version": "v1", "namespaced": true, "verbs": ["get", "update"]}
        ]}),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/apis/batch/v1"))
        .respond_with(ResponseTemplate::new(500).set_body_string("etcd unavailable"))
        .mount(server)
        .await;
    mount_get(
        server,
        "/version",
        json!({"major": "1", "minor": "11+", "gitVersion": "v1.11.0+d4cacc0"}),
    )
    .await;
}

async fn mount_discovery(server: &MockServer) {
    mount_get(server, "/api", json!({"versions": ["v1"]})).await;
    mount_discovery_without_legacy_root(server).await;
}

fn client_for(server: &MockServer) -> ApiClient {
    let config = Config {
        server: Some(server.uri()),
        token: Some("test-token".into()),
        namespace: Some("ns1".into()),
        timeout_secs: Some(5),
        ..Default::default()
    };
    ApiClient::new(config).expect("client should be configured")
}

/// Router over a hand-built catalog whose server is unreachable
fn offline_router() -> RequestRouter {
    let mut builder = CatalogBuilder::new();
    let list: ResourceListDocument = serde_json::from_value(json!({"resources": [
        {"name": "pods", "kind": "Pod", "namespaced": true, "verbs": ["get", "list"]}
    ]}))
    .unwrap();
    let surface = SurfaceVersion {
        address_prefix: "api".into(),
        group_name: None,
        version: "v1".into(),
    };
    builder.add_resource_list(&surface, &list);

    let transport = HttpTransport::new("kubeclient-test", Duration::from_secs(2), None).unwrap();
    RequestRouter::new(
        "http://127.0.0.1:1",
        Arc::new(TypeCatalog::from_catalog(builder.build())),
        transport,
        default_factories(),
    )
    .with_server_version(None)
}

mod discovery_tests {
    use super::*;

    /// Legacy and grouped surfaces both land in the catalog
    #[tokio::test]
    async fn test_discovery_builds_catalog() {
        let server = MockServer::start().await;
        mount_discovery(&server).await;
        let client = client_for(&server);

        let catalog = client.catalog().catalog().await;

        let pods = catalog.resolve(Some("v1"), "Pod").expect("pods discovered");
        assert_eq!(pods.address_prefix, "api");
        assert!(pods.is_supported("log"));

        let deployments = catalog
            .resolve(Some("apps/v1"), "Deployment")
            .expect("deployments discovered");
        assert_eq!(deployments.group_name.as_deref(), Some("apps"));
        assert!(deployments.is_supported("scale"));

        let dc = catalog.resolve(None, "DeploymentConfig").expect("dc discovered");
        assert!(dc.is_supported("instantiate"));

        // Sub-resource entries may name a type from another group
        assert!(catalog.resolve_type(Some("autoscaling/v1"), "Scale").is_some());
        assert_eq!(catalog.groups().len(), 4);
    }

    /// One failing group/version leaves the rest intact
    #[tokio::test]
    async fn test_failed_group_version_is_omitted() {
        let server = MockServer::start().await;
        mount_discovery(&server).await;
        let client = client_for(&server);

        assert!(!client.catalog().is_supported("Job", Some("batch/v1")).await);
        assert!(client.catalog().is_supported("Pod", Some("v1")).await);

        let err = client
            .get(&ResourceIdentity::new("Job").version("batch/v1").name("j1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedEndpoint { .. }));
    }

    /// Concurrent first callers share a single discovery round
    #[tokio::test]
    async fn test_concurrent_first_discovery_runs_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"versions": ["v1"]}))
                    .set_delay(Duration::from_millis(100)),
            )
            .expect(1)
            .mount(&server)
            .await;
        mount_discovery_without_legacy_root(&server).await;

        let client = client_for(&server);
        let readers: Vec<_> = (0..8)
            .map(|_| {
                let catalog = Arc::clone(client.catalog());
                tokio::spawn(async move { catalog.catalog().await })
            })
            .collect();

        let mut snapshots = Vec::new();
        for reader in readers {
            snapshots.push(reader.await.unwrap());
        }
        for snapshot in &snapshots {
            assert!(Arc::ptr_eq(snapshot, &snapshots[0]));
            assert_eq!(snapshot.endpoints().len(), snapshots[0].endpoints().len());
        }
        server.verify().await;
    }

    /// An unreachable server yields an empty catalog, not an error
    #[tokio::test]
    async fn test_unreachable_server_yields_empty_catalog() {
        let config = Config {
            server: Some("http://127.0.0.1:1".into()),
            timeout_secs: Some(2),
            ..Default::default()
        };
        let client = ApiClient::new(config).unwrap();
        assert!(client.catalog().catalog().await.is_empty());
        assert!(!client.catalog().is_supported("Pod", None).await);
    }
}

mod request_tests {
    use super::*;

    #[tokio::test]
    async fn test_get_uses_default_namespace_and_token() {
        let server = MockServer::start().await;
        mount_discovery(&server).await;

        Mock::given(method("GET"))
            .and(path("/api/v1/namespaces/ns1/pods/p1"))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kind": "Pod",
                "apiVersion": "v1",
                "metadata": {"name": "p1", "namespace": "ns1"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let pod = client
            .get(&ResourceIdentity::new("Pod").version("v1").name("p1"))
            .await
            .expect("pod should be returned");
        assert_eq!(pod.name(), Some("p1"));
        assert_eq!(pod.namespace(), Some("ns1"));
    }

    #[tokio::test]
    async fn test_cluster_scoped_kind_has_no_namespace() {
        let server = MockServer::start().await;
        mount_discovery(&server).await;

        Mock::given(method("GET"))
            .and(path("/oapi/v1/projects/myproject"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kind": "Project",
                "apiVersion": "v1",
                "metadata": {"name": "myproject"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let project = client
            .get(&ResourceIdentity::new("Project").name("myproject"))
            .await
            .unwrap();
        assert_eq!(project.kind(), Some("Project"));
    }

    #[tokio::test]
    async fn test_list_materializes_items_and_feeds_watch() {
        let server = MockServer::start().await;
        mount_discovery(&server).await;

        mount_get(
            &server,
            "/api/v1/namespaces/ns1/pods",
            json!({
                "kind": "PodList",
                "apiVersion": "v1",
                "metadata": {"resourceVersion": "42"},
                "items": [
                    {"metadata": {"name": "a"}},
                    {"metadata": {"name": "b"}}
                ]
            }),
        )
        .await;

        let client = client_for(&server);
        let identity = ResourceIdentity::new("Pod").version("v1");
        let list = client.list(&identity).await.unwrap();

        assert_eq!(list.kind, "Pod");
        assert_eq!(list.resource_version.as_deref(), Some("42"));
        assert_eq!(list.items.len(), 2);
        assert!(list
            .items
            .iter()
            .all(|item| item.kind() == Some("Pod") && item.api_version() == Some("v1")));

        let url = client.watch_url(&identity, Some(&list)).await.unwrap();
        assert_eq!(
            url,
            format!("{}/api/v1/watch/namespaces/ns1/pods?resourceVersion=42", server.uri())
        );
    }

    #[tokio::test]
    async fn test_create_sends_payload() {
        let server = MockServer::start().await;
        mount_discovery(&server).await;

        Mock::given(method("POST"))
            .and(path("/api/v1/namespaces/team-a/pods"))
            .and(body_partial_json(json!({"kind": "Pod", "metadata": {"name": "p2"}})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "kind": "Pod",
                "apiVersion": "v1",
                "metadata": {"name": "p2", "namespace": "team-a", "resourceVersion": "7"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let mut pod = Resource::new("v1", "Pod");
        pod.set_name("p2");
        pod.set_namespace("team-a");

        let created = client.create(&pod, None).await.unwrap();
        assert_eq!(created.resource_version(), Some("7"));
    }

    #[tokio::test]
    async fn test_delete_grouped_resource() {
        let server = MockServer::start().await;
        mount_discovery(&server).await;

        Mock::given(method("DELETE"))
            .and(path("/apis/apps/v1/namespaces/ns1/deployments/d1"))
            .and(query_param("propagationPolicy", "Foreground"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kind": "Status",
                "status": "Success"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let request = Request::new(Verb::Delete, "Deployment")
            .version("apps/v1")
            .namespace("ns1")
            .name("d1")
            .param("propagationPolicy", "Foreground");
        let answer: Value = client
            .router()
            .execute(&request, |body| Ok(serde_json::from_str(body)?))
            .await
            .unwrap();
        assert_eq!(answer["status"], "Success");

        let plain = client
            .delete(&ResourceIdentity::new("Deployment").version("apps/v1").name("d1"))
            .await;
        // Without the query parameter the mock does not match
        assert!(plain.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_execute_with_callback() {
        let server = MockServer::start().await;
        mount_discovery(&server).await;
        mount_get(
            &server,
            "/api/v1/namespaces/ns1/pods/p1/log",
            json!("line one\nline two"),
        )
        .await;

        let client = client_for(&server);
        let request = Request::new(Verb::Get, "Pod")
            .version("v1")
            .namespace("ns1")
            .name("p1")
            .subresource("log");

        let (tx, rx) = tokio::sync::oneshot::channel();
        let handle = client.router().execute_with_callback(
            request,
            |body| Ok(body.len()),
            move |result| {
                let _ = tx.send(result);
            },
        );
        handle.await.unwrap();

        let length = rx.await.unwrap().unwrap();
        assert!(length > 0);
    }
}

mod error_tests {
    use super::*;

    async fn get_with_status(code: u16, body: Value) -> Error {
        let server = MockServer::start().await;
        mount_discovery(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/namespaces/ns1/pods/p1"))
            .respond_with(ResponseTemplate::new(code).set_body_json(body))
            .mount(&server)
            .await;

        client_for(&server)
            .get(&ResourceIdentity::new("Pod").version("v1").name("p1"))
            .await
            .unwrap_err()
    }

    #[tokio::test]
    async fn test_401_returns_unauthorized() {
        let err = get_with_status(401, json!({"message": "Unauthorized"})).await;
        assert!(matches!(err, Error::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_403_returns_forbidden() {
        let err = get_with_status(
            403,
            json!({"kind": "Status", "code": 403, "message": "pods is forbidden", "reason": "Forbidden"}),
        )
        .await;
        match err {
            Error::Forbidden { message, url } => {
                assert_eq!(message, "pods is forbidden");
                assert!(url.ends_with("/api/v1/namespaces/ns1/pods/p1"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_404_carries_status() {
        let err = get_with_status(
            404,
            json!({"kind": "Status", "code": 404, "message": "pods \"p1\" not found", "reason": "NotFound"}),
        )
        .await;
        match err {
            Error::ServerRejection { status, .. } => {
                assert_eq!(status.code, 404);
                assert_eq!(status.reason, "NotFound");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unparseable_body_is_materialization_error() {
        let server = MockServer::start().await;
        mount_discovery(&server).await;
        Mock::given(method("GET"))
            .and(path("/api/v1/namespaces/ns1/pods/p1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .get(&ResourceIdentity::new("Pod").version("v1").name("p1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Materialization(_)));
    }

    #[tokio::test]
    async fn test_transport_failure_wraps_url() {
        let router = offline_router();
        let request = Request::new(Verb::Get, "Pod").namespace("ns1").name("p1");
        let err = router
            .execute(&request, |body| Ok(body.to_string()))
            .await
            .unwrap_err();
        match err {
            Error::Transport { url, .. } => {
                assert_eq!(url, "http://127.0.0.1:1/api/v1/namespaces/ns1/pods/p1")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_client_rejects_list_kind_before_discovery() {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let get = client
            .get(&ResourceIdentity::new("List").name("x"))
            .await
            .unwrap_err();
        assert!(matches!(get, Error::UnsupportedOperation { .. }));

        let list = client.list(&ResourceIdentity::new("List")).await.unwrap_err();
        assert!(matches!(list, Error::UnsupportedOperation { .. }));

        let delete = client
            .delete(&ResourceIdentity::new("List").name("x"))
            .await
            .unwrap_err();
        assert!(matches!(delete, Error::UnsupportedOperation { .. }));

        assert!(!client.catalog().is_discovered());
        server.verify().await;
    }

    #[tokio::test]
    async fn test_list_kind_is_rejected_without_network() {
        let router = offline_router();
        let request = Request::new(Verb::Get, "List").namespace("ns1");
        let err = router
            .execute(&request, |body| Ok(body.to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedOperation { .. }));
    }
}

mod capability_tests {
    use super::*;

    #[tokio::test]
    async fn test_client_capabilities_from_catalog() {
        let server = MockServer::start().await;
        mount_discovery(&server).await;
        let client = client_for(&server);

        assert!(client.supports(CapabilityKind::ProjectRequest).await);
        assert!(!client.supports(CapabilityKind::PodLogs).await);

        let version = client.server_version().await.expect("version probed");
        assert_eq!(version.numeric(), Some((1, 11)));
    }

    #[tokio::test]
    async fn test_resource_capabilities() {
        let server = MockServer::start().await;
        mount_discovery(&server).await;
        let client = client_for(&server);

        let mut dc = Resource::new("v1", "DeploymentConfig");
        dc.set_name("frontend");
        let dc = client.capabilities_for(dc).await;
        let mode = dc.accept_if_supported(
            CapabilityKind::DeploymentTrigger,
            |capability| match capability {
                Capability::DeploymentTrigger { mode } => Some(*mode),
                _ => None,
            },
            None,
        );
        assert_eq!(mode, Some(TriggerMode::Instantiate));

        let pod = client.capabilities_for(Resource::new("v1", "Pod")).await;
        assert!(pod.supports(CapabilityKind::PodLogs));
        assert!(!pod.supports(CapabilityKind::PodExec));
    }
}
