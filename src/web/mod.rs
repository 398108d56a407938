pub mod root_service;
pub mod uri_cursor;

use anyhow::{Context, Error, ensure};
use bytes::Bytes;
use http::{Extensions, HeaderMap, HeaderValue, Method, StatusCode, Uri, header};
use serde::{Deserialize, Serialize};

/// Inbound request as seen by handlers.
///
/// Method, uri, headers and body are fixed once the request is created. Handlers that need to
/// pass data down the chain (eg. authorization results computed by a parent router) attach it
/// through [`Request::extensions_mut`].
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,

    extensions: Extensions,
}
impl Request {
    pub fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
            extensions: Extensions::new(),
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }
    pub fn uri(&self) -> &Uri {
        &self.uri
    }
    pub fn path(&self) -> &str {
        self.uri.path()
    }
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }
    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    pub fn body_parse_json<'a, T: Deserialize<'a>>(&'a self) -> Result<T, Error> {
        let content_type = self
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|header| header.to_str().ok());

        ensure!(
            content_type == Some("application/json"),
            "expected content type application/json, got: {:?}",
            content_type,
        );

        let json = serde_json::from_slice(&self.body).context("from_slice")?;

        Ok(json)
    }
}
impl From<http::Request<Bytes>> for Request {
    fn from(request: http::Request<Bytes>) -> Self {
        let (parts, body) = request.into_parts();
        let mut request = Self::new(parts.method, parts.uri, parts.headers, body);
        request.extensions = parts.extensions;
        request
    }
}

#[derive(Debug)]
pub struct Response {
    http_response: http::Response<Bytes>,
}
impl Response {
    pub fn from_http_response(http_response: http::Response<Bytes>) -> Self {
        Self { http_response }
    }
    pub fn into_http_response(self) -> http::Response<Bytes> {
        self.http_response
    }

    pub fn status(&self) -> StatusCode {
        self.http_response.status()
    }
    pub fn headers(&self) -> &HeaderMap {
        self.http_response.headers()
    }
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.http_response.headers_mut()
    }
    pub fn body(&self) -> &Bytes {
        self.http_response.body()
    }

    pub fn ok_empty() -> Self {
        Self::from_http_response(http::Response::new(Bytes::new()))
    }
    pub fn ok_content_type_body<B>(
        body: B,
        content_type: HeaderValue,
    ) -> Self
    where
        B: Into<Bytes>,
    {
        let mut http_response = http::Response::new(body.into());
        http_response
            .headers_mut()
            .insert(header::CONTENT_TYPE, content_type);
        Self::from_http_response(http_response)
    }
    pub fn ok_text<B>(body: B) -> Self
    where
        B: Into<Bytes>,
    {
        Self::ok_content_type_body(body, HeaderValue::from_static("text/plain; charset=utf-8"))
    }
    pub fn ok_json<T: Serialize>(value: T) -> Result<Self, Error> {
        let body = serde_json::to_vec(&value).context("to_vec")?;
        Ok(Self::ok_content_type_body(
            body,
            HeaderValue::from_static("application/json"),
        ))
    }

    pub fn error(status_code: StatusCode) -> Self {
        let mut http_response = http::Response::new(Bytes::new());
        *http_response.status_mut() = status_code;
        Self::from_http_response(http_response)
    }
    pub fn error_400_from_error<T: Into<Error>>(error: T) -> Self {
        let mut http_response = http::Response::new(Bytes::from(error.into().to_string()));
        *http_response.status_mut() = StatusCode::BAD_REQUEST;
        Self::from_http_response(http_response)
    }
    pub fn error_404() -> Self {
        Self::error(StatusCode::NOT_FOUND)
    }
    pub fn error_405() -> Self {
        Self::error(StatusCode::METHOD_NOT_ALLOWED)
    }
    pub fn error_500() -> Self {
        Self::error(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Top level handler, sitting directly behind the transport.
pub trait Handler: Send + Sync {
    fn handle(
        &self,
        request: Request,
    ) -> Response;
}

#[cfg(test)]
mod tests_request {
    use super::Request;
    use bytes::Bytes;
    use http::{Method, header};
    use serde::Deserialize;

    #[derive(PartialEq, Eq, Debug, Deserialize)]
    struct Payload {
        value: u32,
    }

    fn request(
        content_type: &str,
        body: &'static str,
    ) -> Request {
        Request::from(
            http::Request::builder()
                .method(Method::POST)
                .uri("/items/?page=2")
                .header(header::CONTENT_TYPE, content_type)
                .body(Bytes::from_static(body.as_bytes()))
                .unwrap(),
        )
    }

    #[test]
    fn test_accessors_1() {
        let request = request("application/json", "{}");
        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.path(), "/items/");
        assert_eq!(request.query(), Some("page=2"));
    }

    #[test]
    fn test_extensions_1() {
        #[derive(Clone, PartialEq, Eq, Debug)]
        struct UserId(u32);

        let mut request = request("application/json", "{}");
        assert!(request.extensions().get::<UserId>().is_none());
        request.extensions_mut().insert(UserId(7));
        assert_eq!(request.extensions().get::<UserId>(), Some(&UserId(7)));
        assert_eq!(request.path(), "/items/");
    }

    #[test]
    fn test_body_parse_json_1() {
        let request = request("application/json", r#"{"value": 5}"#);
        let payload: Payload = request.body_parse_json().unwrap();
        assert_eq!(payload, Payload { value: 5 });
    }

    #[test]
    fn test_body_parse_json_2() {
        let request = request("text/plain", r#"{"value": 5}"#);
        assert!(request.body_parse_json::<Payload>().is_err());
    }
}

#[cfg(test)]
mod tests_response {
    use super::Response;
    use anyhow::anyhow;
    use http::{StatusCode, header};
    use serde_json::json;

    #[test]
    fn test_ok_json_1() {
        let response = Response::ok_json(json!({ "id": 5 })).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(response.body(), r#"{"id":5}"#);
    }

    #[test]
    fn test_error_400_from_error_1() {
        let response = Response::error_400_from_error(anyhow!("value out of range"));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.body(), "value out of range");
    }

    #[test]
    fn test_errors_1() {
        assert_eq!(Response::error_404().status(), StatusCode::NOT_FOUND);
        assert_eq!(
            Response::error_405().status(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            Response::error_500().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert!(Response::error_404().body().is_empty());
    }

    #[test]
    fn test_into_http_response_1() {
        let http_response = Response::ok_text("hello").into_http_response();
        assert_eq!(http_response.status(), StatusCode::OK);
        assert_eq!(http_response.body(), "hello");
    }
}
