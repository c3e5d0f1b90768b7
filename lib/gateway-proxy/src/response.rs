//! Canned gateway responses

use http_body_util::Full;
use hyper::{body::Bytes, Response, StatusCode};

fn status_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("content-type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(format!("{}\n", message))))
        .unwrap()
}

/// Create a 200 OK plain-text response
pub fn ok_text_response(message: &str) -> Response<Full<Bytes>> {
    status_response(StatusCode::OK, message)
}

/// Create a 400 Bad Request response
pub fn bad_request_response(reason: &str) -> Response<Full<Bytes>> {
    status_response(StatusCode::BAD_REQUEST, &format!("Bad Request: {}", reason))
}

/// Create a 404 Not Found response
pub fn not_found_response(reason: &str) -> Response<Full<Bytes>> {
    status_response(StatusCode::NOT_FOUND, &format!("Not Found: {}", reason))
}

/// Create a 502 Bad Gateway response
pub fn bad_gateway_response(reason: &str) -> Response<Full<Bytes>> {
    status_response(StatusCode::BAD_GATEWAY, &format!("Bad Gateway: {}", reason))
}

/// Create a 503 Service Unavailable response
pub fn service_unavailable_response(reason: &str) -> Response<Full<Bytes>> {
    status_response(
        StatusCode::SERVICE_UNAVAILABLE,
        &format!("Service Unavailable: {}", reason),
    )
}

/// Create a 504 Gateway Timeout response
pub fn gateway_timeout_response(reason: &str) -> Response<Full<Bytes>> {
    status_response(
        StatusCode::GATEWAY_TIMEOUT,
        &format!("Gateway Timeout: {}", reason),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(not_found_response("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(bad_gateway_response("x").status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            service_unavailable_response("x").status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            gateway_timeout_response("x").status(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }
}
