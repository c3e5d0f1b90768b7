//! Request handling: route match, instance selection, upstream forwarding

use discovery_client::DiscoveryCache;
use gateway_proxy::{
    response, ForwardError, GatewayMetrics, LoadBalancer, RequestForwarder, RouteMatch, RouteTable,
};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Long-lived gateway state shared by every connection task
pub struct GatewayContext {
    pub routes: RouteTable,
    pub cache: Arc<DiscoveryCache>,
    pub balancer: LoadBalancer,
    pub forwarder: RequestForwarder,
    pub metrics: GatewayMetrics,
}

/// Entry point for one inbound request.
pub async fn handle_request(
    req: Request<Incoming>,
    context: Arc<GatewayContext>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let headers = req.headers().clone();

    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Failed to read request body: {}", e);
            return Ok(response::bad_request_response("Unreadable request body"));
        }
    };

    Ok(proxy(&context, method, &path, &headers, body).await)
}

/// Core proxy flow, separated from the hyper plumbing so tests can drive it.
pub async fn proxy(
    context: &GatewayContext,
    method: Method,
    path: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> Response<Full<Bytes>> {
    debug!("{} {}", method, path);

    if method == Method::GET && path == "/healthz" {
        return response::ok_text_response("OK");
    }
    if method == Method::GET && path == "/metrics" {
        let text = context
            .metrics
            .gather()
            .unwrap_or_else(|_| "Failed to gather metrics\n".to_string());
        return Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "text/plain; version=0.0.4")
            .body(Full::new(Bytes::from(text)))
            .unwrap();
    }

    let response = match context.routes.match_request(method.as_str(), path) {
        None => {
            debug!("No route for {} {}", method, path);
            context.metrics.record_unmatched(method.as_str());
            response::not_found_response("No matching route")
        }
        Some(matched) => {
            context.metrics.record_request(method.as_str(), &matched.route);
            forward_to_service(context, &matched, method, headers, body).await
        }
    };

    context.metrics.record_response(response.status().as_u16());
    response
}

/// Select an instance for the matched route and forward the request,
/// retrying exactly once against a different instance on connect failure.
async fn forward_to_service(
    context: &GatewayContext,
    matched: &RouteMatch,
    method: Method,
    headers: &HeaderMap,
    body: Bytes,
) -> Response<Full<Bytes>> {
    let instances = context.cache.instances(&matched.service);
    let selected = match context.balancer.select(&instances, &[]) {
        Some(instance) => instance,
        None => {
            warn!("No live instances for service {}", matched.service);
            return response::service_unavailable_response(&format!(
                "No live instances for {}",
                matched.service
            ));
        }
    };

    let started = Instant::now();
    let target_url = format!("http://{}{}", selected.address(), matched.rewritten_path);
    let first_attempt = context
        .forwarder
        .forward(&target_url, method.clone(), headers, body.clone())
        .await;

    let result = match first_attempt {
        Err(ForwardError::Connect(reason)) => {
            // One retry against a different instance from the same snapshot
            match context
                .balancer
                .select(&instances, &[selected.instance_id.as_str()])
            {
                Some(retry_instance) => {
                    warn!(
                        "Connect to {} failed ({}); retrying against {}",
                        selected.instance_id, reason, retry_instance.instance_id
                    );
                    context.metrics.record_retry();
                    let retry_url = format!(
                        "http://{}{}",
                        retry_instance.address(),
                        matched.rewritten_path
                    );
                    context
                        .forwarder
                        .forward(&retry_url, method, headers, body)
                        .await
                }
                None => {
                    debug!(
                        "No alternative instance for {} after connect failure",
                        matched.service
                    );
                    Err(ForwardError::Connect(reason))
                }
            }
        }
        other => other,
    };

    match result {
        Ok(upstream) => {
            context
                .metrics
                .record_upstream_duration(&matched.service, started.elapsed());
            let (parts, bytes) = upstream.into_parts();
            Response::from_parts(parts, Full::new(bytes))
        }
        Err(ForwardError::Timeout(timeout)) => response::gateway_timeout_response(&format!(
            "Upstream did not respond within {:?}",
            timeout
        )),
        Err(e) => {
            warn!("Forwarding failed for {}: {}", matched.service, e);
            response::bad_gateway_response("Upstream request failed")
        }
    }
}
