use anyhow::Result;
use discovery_client::{BackoffPolicy, HeartbeatTask, RegistryClient};
use discovery_core::{InstanceStatus, ServiceInstance};
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::tokio::TokioIo;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};
use tracing_subscriber::fmt::init as tracing_init;
use uuid::Uuid;

mod config;

use config::BackendConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_init();

    let config = BackendConfig::from_env()?;
    let instance_id = Uuid::new_v4().to_string();
    info!(
        "Starting backend-service instance {} on {}",
        instance_id, config.listen_addr
    );

    let instance = ServiceInstance {
        instance_id: instance_id.clone(),
        host: config.advertised_host.clone(),
        port: config.listen_addr.port(),
        status: InstanceStatus::Up,
    };

    let client = RegistryClient::new(config.registry_url.clone())?;
    client
        .register_with_backoff(&config.service_name, &instance, &BackoffPolicy::default())
        .await?;
    info!(
        "Registered with registry as {}/{}",
        config.service_name, instance_id
    );

    let heartbeat = HeartbeatTask::new(
        client.clone(),
        config.service_name.clone(),
        instance.clone(),
        config.heartbeat_interval,
    );
    let heartbeat_handle = tokio::task::spawn(heartbeat.run());

    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!("Backend listening on {}", config.listen_addr);

    let id = Arc::new(instance_id.clone());
    let serve = async {
        loop {
            let (stream, peer_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Accept error: {}", e);
                    continue;
                }
            };
            let io = TokioIo::new(stream);
            let id = id.clone();

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let id = id.clone();
                    async move { handle_request(req, &id).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Error serving connection from {}: {}", peer_addr, e);
                }
            });
        }
    };

    tokio::select! {
        _ = serve => {}
        _ = tokio::signal::ctrl_c() => {
            info!(
                "Shutting down; deregistering {}/{}",
                config.service_name, instance_id
            );
        }
    }

    heartbeat_handle.abort();
    if let Err(e) = client.deregister(&config.service_name, &instance_id).await {
        warn!("Deregistration failed: {}", e);
    }
    Ok(())
}

async fn handle_request(
    req: Request<Incoming>,
    instance_id: &str,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    debug!("{} {}", method, path);

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let response = match (method.as_str(), segments.as_slice()) {
        ("GET", ["healthz"]) => text_response(StatusCode::OK, "OK".to_string()),
        ("GET", ["id"]) => text_response(StatusCode::OK, instance_id.to_string()),
        ("GET", ["print", msg]) => {
            text_response(StatusCode::OK, print_message(msg, instance_id))
        }
        _ => text_response(StatusCode::NOT_FOUND, "Not Found".to_string()),
    };
    Ok(response)
}

/// Echo the message with this instance's identity appended
fn print_message(msg: &str, instance_id: &str) -> String {
    format!("{} {}", msg, instance_id)
}

fn text_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("content-type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_print_message_appends_instance_id() {
        assert_eq!(print_message("hello", "abc-123"), "hello abc-123");
    }

    #[test]
    fn test_text_response_status() {
        let response = text_response(StatusCode::OK, "OK".to_string());
        assert_eq!(response.status(), StatusCode::OK);
    }
}
