//! Engine-neutral request context.
//!
//! # Responsibilities
//! - Expose the request (headers, body, cookies, form, path and query params)
//! - Collect the response (status, headers, cookies, body, redirects, streams)
//! - Carry per-request attributes and the request span
//! - Offer an escape hatch to the engine's native request object
//!
//! # Design Decisions
//! - Engines implement a small set of required accessors; everything else is
//!   a provided method so all engines parse queries, forms and cookies the same way
//! - Generic helpers (JSON) live in `WebContextExt` to keep the trait object safe

use std::any::Any;
use std::net::SocketAddr;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::WebError;
use crate::http::response::{BodyStream, ResponseBody, ResponseState};

/// Per-request context handed to filters and handlers.
pub trait WebContext: Send {
    // ----- general -----

    /// Name of the engine serving this request.
    fn engine(&self) -> &'static str;

    /// The engine's native request object. Use sparingly.
    fn native(&mut self) -> &mut (dyn Any + Send);

    /// Span the request runs in.
    fn span(&self) -> &tracing::Span;

    /// Read a request-scoped attribute.
    fn get(&self, key: &str) -> Option<&(dyn Any + Send + Sync)>;

    /// Store a request-scoped attribute.
    fn set(&mut self, key: &str, value: Box<dyn Any + Send + Sync>);

    // ----- request -----

    fn method(&self) -> &Method;

    fn uri(&self) -> &Uri;

    fn headers(&self) -> &HeaderMap;

    /// Buffered request body.
    fn body(&self) -> &Bytes;

    /// The registered path pattern that matched, empty if none did.
    fn path(&self) -> &str;

    /// Path parameters captured by the engine's router, in pattern order.
    fn path_params(&self) -> &[(String, String)];

    /// Peer address of the connection, when known.
    fn remote_addr(&self) -> Option<SocketAddr>;

    fn is_tls(&self) -> bool;

    // ----- response -----

    fn response(&self) -> &ResponseState;

    fn response_mut(&mut self) -> &mut ResponseState;

    /// Report an error through the container's error handler.
    fn error(&mut self, err: WebError);

    // ----- provided request helpers -----

    /// Request path as sent by the client.
    fn request_path(&self) -> &str {
        self.uri().path()
    }

    fn scheme(&self) -> &'static str {
        if self.is_tls() {
            "https"
        } else {
            "http"
        }
    }

    fn is_websocket(&self) -> bool {
        self.header(header::UPGRADE.as_str())
            .is_some_and(|upgrade| upgrade.eq_ignore_ascii_case("websocket"))
    }

    /// Best-effort client IP: `X-Forwarded-For` first, then `X-Real-Ip`,
    /// then the peer address.
    fn client_ip(&self) -> Option<String> {
        if let Some(forwarded) = self.header("x-forwarded-for") {
            if let Some(first) = forwarded.split(',').map(str::trim).find(|ip| !ip.is_empty()) {
                return Some(first.to_string());
            }
        }
        if let Some(real) = self.header("x-real-ip").map(str::trim).filter(|ip| !ip.is_empty()) {
            return Some(real.to_string());
        }
        self.remote_addr().map(|addr| addr.ip().to_string())
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers().get(name).and_then(|value| value.to_str().ok())
    }

    fn content_type(&self) -> Option<&str> {
        self.header(header::CONTENT_TYPE.as_str())
    }

    fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params()
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn path_param_names(&self) -> Vec<&str> {
        self.path_params().iter().map(|(key, _)| key.as_str()).collect()
    }

    fn path_param_values(&self) -> Vec<&str> {
        self.path_params().iter().map(|(_, value)| value.as_str()).collect()
    }

    fn query_string(&self) -> &str {
        self.uri().query().unwrap_or("")
    }

    fn query_params(&self) -> Vec<(String, String)> {
        url::form_urlencoded::parse(self.query_string().as_bytes())
            .into_owned()
            .collect()
    }

    fn query_param(&self, name: &str) -> Option<String> {
        url::form_urlencoded::parse(self.query_string().as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// URL-encoded form fields from the request body.
    fn form_params(&self) -> Result<Vec<(String, String)>, WebError> {
        let content_type = self.content_type().unwrap_or("");
        if !content_type.starts_with("application/x-www-form-urlencoded") {
            return Err(WebError::UnsupportedMediaType(content_type.to_string()));
        }
        Ok(url::form_urlencoded::parse(self.body()).into_owned().collect())
    }

    /// A form field, looked up in the query string first, then the body.
    fn form_value(&self, name: &str) -> Option<String> {
        self.query_param(name).or_else(|| {
            self.form_params()
                .ok()?
                .into_iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value)
        })
    }

    fn cookies(&self) -> Vec<(String, String)> {
        self.headers()
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                Some((name.trim().to_string(), value.trim().trim_matches('"').to_string()))
            })
            .collect()
    }

    fn cookie(&self, name: &str) -> Option<String> {
        self.cookies()
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    // ----- provided response helpers -----

    fn status(&mut self, code: StatusCode) {
        self.response_mut().set_status(code);
    }

    /// Set a response header; an empty value removes it.
    fn set_header(&mut self, key: &str, value: &str) {
        self.response_mut().set_header(key, value);
    }

    /// Add a `Set-Cookie` header, e.g. `"session=abc; Path=/; HttpOnly"`.
    fn set_cookie(&mut self, cookie: &str) {
        match HeaderValue::from_str(cookie) {
            Ok(value) => self.response_mut().append_header(header::SET_COOKIE, value),
            Err(_) => tracing::warn!("Ignoring invalid Set-Cookie value"),
        }
    }

    fn no_content(&mut self, code: StatusCode) {
        self.response_mut().write(code, None, ResponseBody::Empty);
    }

    fn string(&mut self, code: StatusCode, body: &str) {
        self.blob(code, "text/plain; charset=utf-8", Bytes::copy_from_slice(body.as_bytes()));
    }

    fn html(&mut self, code: StatusCode, html: &str) {
        self.blob(code, "text/html; charset=utf-8", Bytes::copy_from_slice(html.as_bytes()));
    }

    fn json_blob(&mut self, code: StatusCode, body: Bytes) {
        self.blob(code, "application/json", body);
    }

    fn blob(&mut self, code: StatusCode, content_type: &str, body: Bytes) {
        self.response_mut().write(code, Some(content_type), ResponseBody::Full(body));
    }

    fn stream(&mut self, code: StatusCode, content_type: &str, body: BodyStream) {
        self.response_mut().write(code, Some(content_type), ResponseBody::Stream(body));
    }

    fn redirect(&mut self, code: StatusCode, location: &str) {
        if !code.is_redirection() {
            self.error(WebError::Internal(format!("{code} is not a redirect status")));
            return;
        }
        let response = self.response_mut();
        response.write(code, None, ResponseBody::Empty);
        match HeaderValue::from_str(location) {
            Ok(value) => {
                response.headers_mut().insert(header::LOCATION, value);
            }
            Err(_) => tracing::warn!(location, "Ignoring invalid redirect location"),
        }
    }
}

/// Generic helpers over any [`WebContext`].
pub trait WebContextExt: WebContext {
    /// Typed request-scoped attribute.
    fn attribute<T: Any>(&self, key: &str) -> Option<&T> {
        self.get(key).and_then(|value| value.downcast_ref::<T>())
    }

    /// Deserialize the JSON request body.
    fn bind_json<T: DeserializeOwned>(&self) -> Result<T, WebError> {
        Ok(serde_json::from_slice(self.body())?)
    }

    /// Serialize `value` as the JSON response body.
    fn json<T: Serialize + ?Sized>(&mut self, code: StatusCode, value: &T) -> Result<(), WebError> {
        let body = serde_json::to_vec(value)?;
        self.json_blob(code, Bytes::from(body));
        Ok(())
    }
}

impl<C: WebContext + ?Sized> WebContextExt for C {}
