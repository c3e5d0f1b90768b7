//! HTTP/JSON surface over the instance registry

use discovery_core::{CoreError, InstanceRegistry, ServiceInstance};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::{Method, Request, Response, StatusCode};
use std::sync::Arc;
use tracing::debug;

/// Dispatch one registry API request.
pub async fn handle_request(
    req: Request<Incoming>,
    registry: Arc<InstanceRegistry>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!("{} {}", method, path);

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            return Ok(text_response(
                StatusCode::BAD_REQUEST,
                &format!("Unreadable request body: {}", e),
            ))
        }
    };

    Ok(route(&method, &path, &body, &registry).await)
}

/// Route a request to the matching registry operation.
async fn route(
    method: &Method,
    path: &str,
    body: &Bytes,
    registry: &InstanceRegistry,
) -> Response<Full<Bytes>> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    match (method.as_str(), segments.as_slice()) {
        ("GET", ["healthz"]) => text_response(StatusCode::OK, "OK"),
        ("GET", ["instances", service]) => lookup(registry, service).await,
        ("PUT", ["instances", service, instance_id]) => {
            // A register carries the instance descriptor; a heartbeat is an
            // empty PUT to the same resource
            if body.is_empty() {
                heartbeat(registry, service, instance_id).await
            } else {
                register(registry, service, instance_id, body).await
            }
        }
        ("DELETE", ["instances", service, instance_id]) => {
            registry.deregister(service, instance_id).await;
            status_only(StatusCode::NO_CONTENT)
        }
        _ => text_response(StatusCode::NOT_FOUND, "Unknown registry path"),
    }
}

async fn register(
    registry: &InstanceRegistry,
    service: &str,
    instance_id: &str,
    body: &Bytes,
) -> Response<Full<Bytes>> {
    let descriptor: ServiceInstance = match serde_json::from_slice(body) {
        Ok(descriptor) => descriptor,
        Err(e) => {
            return text_response(
                StatusCode::BAD_REQUEST,
                &format!("Invalid instance descriptor: {}", e),
            )
        }
    };
    if descriptor.instance_id != instance_id {
        return text_response(
            StatusCode::BAD_REQUEST,
            "Instance id in path and body disagree",
        );
    }

    match registry.register(service, descriptor).await {
        Ok(()) => json_response(
            StatusCode::CREATED,
            format!("{{\"instance_id\":\"{}\"}}", instance_id),
        ),
        Err(e) => text_response(error_status(&e), &e.to_string()),
    }
}

async fn heartbeat(
    registry: &InstanceRegistry,
    service: &str,
    instance_id: &str,
) -> Response<Full<Bytes>> {
    match registry.heartbeat(service, instance_id).await {
        Ok(()) => status_only(StatusCode::NO_CONTENT),
        Err(e) => text_response(error_status(&e), &e.to_string()),
    }
}

async fn lookup(registry: &InstanceRegistry, service: &str) -> Response<Full<Bytes>> {
    let instances = registry.lookup(service).await;
    match serde_json::to_string(&instances) {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(e) => text_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &format!("Serialization error: {}", e),
        ),
    }
}

fn error_status(error: &CoreError) -> StatusCode {
    match error {
        CoreError::ServiceNotFound(_) | CoreError::InstanceNotFound(_, _) => StatusCode::NOT_FOUND,
        CoreError::DuplicateInstance(_, _) => StatusCode::CONFLICT,
    }
}

fn text_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("content-type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(format!("{}\n", message))))
        .unwrap()
}

fn json_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

fn status_only(status: StatusCode) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_core::InstanceStatus;
    use std::time::Duration;

    fn registry() -> InstanceRegistry {
        InstanceRegistry::new(Duration::from_secs(30))
    }

    fn descriptor_body(instance_id: &str, port: u16) -> Bytes {
        let descriptor = ServiceInstance {
            instance_id: instance_id.to_string(),
            host: "127.0.0.1".to_string(),
            port,
            status: InstanceStatus::Up,
        };
        Bytes::from(serde_json::to_vec(&descriptor).expect("Failed to serialize"))
    }

    async fn body_text(response: Response<Full<Bytes>>) -> String {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8")
    }

    #[tokio::test]
    async fn test_register_then_lookup_roundtrip() {
        let registry = registry();
        let response = route(
            &Method::PUT,
            "/instances/backend-service/a",
            &descriptor_body("a", 8081),
            &registry,
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = route(
            &Method::GET,
            "/instances/backend-service",
            &Bytes::new(),
            &registry,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_text(response).await;
        let instances: Vec<ServiceInstance> =
            serde_json::from_str(&body).expect("Invalid lookup body");
        assert_eq!(instances.len(), 1);
        assert_eq!(instances[0].instance_id, "a");
    }

    #[tokio::test]
    async fn test_lookup_unknown_service_is_empty_list() {
        let registry = registry();
        let response = route(&Method::GET, "/instances/ghost", &Bytes::new(), &registry).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "[]");
    }

    #[tokio::test]
    async fn test_empty_put_is_heartbeat() {
        let registry = registry();
        route(
            &Method::PUT,
            "/instances/backend-service/a",
            &descriptor_body("a", 8081),
            &registry,
        )
        .await;

        let response = route(
            &Method::PUT,
            "/instances/backend-service/a",
            &Bytes::new(),
            &registry,
        )
        .await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_heartbeat_unknown_instance_is_404() {
        let registry = registry();
        let response = route(
            &Method::PUT,
            "/instances/backend-service/ghost",
            &Bytes::new(),
            &registry,
        )
        .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_conflicting_registration_is_409() {
        let registry = registry();
        route(
            &Method::PUT,
            "/instances/backend-service/a",
            &descriptor_body("a", 8081),
            &registry,
        )
        .await;

        let response = route(
            &Method::PUT,
            "/instances/backend-service/a",
            &descriptor_body("a", 9999),
            &registry,
        )
        .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let registry = registry();
        route(
            &Method::PUT,
            "/instances/backend-service/a",
            &descriptor_body("a", 8081),
            &registry,
        )
        .await;

        for _ in 0..2 {
            let response = route(
                &Method::DELETE,
                "/instances/backend-service/a",
                &Bytes::new(),
                &registry,
            )
            .await;
            assert_eq!(response.status(), StatusCode::NO_CONTENT);
        }
    }

    #[tokio::test]
    async fn test_mismatched_path_and_body_id_is_400() {
        let registry = registry();
        let response = route(
            &Method::PUT,
            "/instances/backend-service/other",
            &descriptor_body("a", 8081),
            &registry,
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_body_is_400() {
        let registry = registry();
        let response = route(
            &Method::PUT,
            "/instances/backend-service/a",
            &Bytes::from_static(b"not json"),
            &registry,
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_path_is_404() {
        let registry = registry();
        let response = route(&Method::GET, "/nope", &Bytes::new(), &registry).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_healthz() {
        let registry = registry();
        let response = route(&Method::GET, "/healthz", &Bytes::new(), &registry).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
