//! Leaf handler dispatching on HTTP method.
//!
//! Meant as the terminal piece of a routing tree: it does not look at the remaining path nor at
//! captured parameters. Anything that needs to interpret the path should be a
//! [`Router`](super::router::Router) placed above it.

use super::{Handler, Outcome, Parameters, UriCursor};
use crate::web::{Request, Response};
use anyhow::{Context, Error};
use http::{HeaderValue, Method, header};
use itertools::Itertools;
use std::fmt;

pub type AuthFn = dyn Fn(&mut Request) -> Result<Option<Response>, Error> + Send + Sync;
pub type MethodFn = dyn Fn(&mut Request) -> Result<Response, Error> + Send + Sync;

/// Methods handled by [`MethodHandler`], in order used in `Allow` header.
pub const KNOWN_METHODS: [Method; 8] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::HEAD,
    Method::OPTIONS,
    Method::TRACE,
];

pub struct MethodHandler {
    auth: Option<Box<AuthFn>>,
    methods: Box<[(Method, Box<MethodFn>)]>,
}
impl MethodHandler {
    pub fn builder() -> MethodHandlerBuilder {
        MethodHandlerBuilder::new()
    }

    pub fn allowed_methods(&self) -> impl Iterator<Item = &Method> {
        self.methods.iter().map(|(method, _)| method)
    }

    fn allow_header(
        &self,
        with_options: bool,
    ) -> Result<HeaderValue, Error> {
        let mut allowed = self
            .allowed_methods()
            .map(Method::as_str)
            .collect::<Vec<_>>();
        if with_options && !allowed.contains(&"OPTIONS") {
            allowed.push("OPTIONS");
        }
        let value = HeaderValue::from_str(&allowed.iter().join(", ")).context("from_str")?;
        Ok(value)
    }

    fn handle_method(
        &self,
        request: &mut Request,
    ) -> Result<Response, Error> {
        if let Some(auth) = &self.auth {
            if let Some(response) = auth(request)? {
                return Ok(response);
            }
        }

        let method = request.method().clone();
        if let Some((_, handler)) = self.methods.iter().find(|(known, _)| *known == method) {
            return handler(request);
        }

        if method == Method::OPTIONS {
            let mut response = Response::ok_empty();
            let headers = response.headers_mut();
            headers.insert(header::ALLOW, self.allow_header(true)?);
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
            return Ok(response);
        }

        log::debug!("method {method} not allowed");
        let mut response = Response::error_405();
        response
            .headers_mut()
            .insert(header::ALLOW, self.allow_header(false)?);
        Ok(response)
    }
}
impl Handler for MethodHandler {
    fn handle(
        &self,
        request: &mut Request,
        _uri_cursor: &mut UriCursor,
        _parameters: &Parameters,
    ) -> Result<Outcome, Error> {
        self.handle_method(request).map(Outcome::Response)
    }
}
impl fmt::Debug for MethodHandler {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("MethodHandler")
            .field("auth", &self.auth.is_some())
            .field("methods", &self.allowed_methods().collect::<Vec<_>>())
            .finish()
    }
}

pub struct MethodHandlerBuilder {
    auth: Option<Box<AuthFn>>,
    methods: Vec<(Method, Box<MethodFn>)>,
}
impl MethodHandlerBuilder {
    pub fn new() -> Self {
        Self {
            auth: None,
            methods: Vec::new(),
        }
    }

    /// Runs before every method, may answer instead of it.
    pub fn auth<F>(
        mut self,
        auth: F,
    ) -> Self
    where
        F: Fn(&mut Request) -> Result<Option<Response>, Error> + Send + Sync + 'static,
    {
        self.auth = Some(Box::new(auth));
        self
    }

    /// Sets handler for `method`, replacing previous one.
    pub fn method<F>(
        mut self,
        method: Method,
        handler: F,
    ) -> Self
    where
        F: Fn(&mut Request) -> Result<Response, Error> + Send + Sync + 'static,
    {
        self.methods.retain(|(known, _)| *known != method);
        self.methods.push((method, Box::new(handler)));
        self
    }

    pub fn get<F>(
        self,
        handler: F,
    ) -> Self
    where
        F: Fn(&mut Request) -> Result<Response, Error> + Send + Sync + 'static,
    {
        self.method(Method::GET, handler)
    }
    pub fn post<F>(
        self,
        handler: F,
    ) -> Self
    where
        F: Fn(&mut Request) -> Result<Response, Error> + Send + Sync + 'static,
    {
        self.method(Method::POST, handler)
    }
    pub fn put<F>(
        self,
        handler: F,
    ) -> Self
    where
        F: Fn(&mut Request) -> Result<Response, Error> + Send + Sync + 'static,
    {
        self.method(Method::PUT, handler)
    }
    pub fn patch<F>(
        self,
        handler: F,
    ) -> Self
    where
        F: Fn(&mut Request) -> Result<Response, Error> + Send + Sync + 'static,
    {
        self.method(Method::PATCH, handler)
    }
    pub fn delete<F>(
        self,
        handler: F,
    ) -> Self
    where
        F: Fn(&mut Request) -> Result<Response, Error> + Send + Sync + 'static,
    {
        self.method(Method::DELETE, handler)
    }

    pub fn build(mut self) -> MethodHandler {
        self.methods.sort_by_key(|(method, _)| {
            KNOWN_METHODS
                .iter()
                .position(|known| known == method)
                .unwrap_or(KNOWN_METHODS.len())
        });

        MethodHandler {
            auth: self.auth,
            methods: self.methods.into_boxed_slice(),
        }
    }
}
impl Default for MethodHandlerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests_method_handler {
    use super::MethodHandler;
    use crate::web::{
        Request, Response,
        uri_cursor::{Handler, Outcome, Parameters, UriCursor},
    };
    use anyhow::anyhow;
    use bytes::Bytes;
    use http::{HeaderMap, Method, StatusCode, header};

    fn handle(
        handler: &MethodHandler,
        method: Method,
    ) -> Response {
        let mut request = Request::new(
            method,
            "/item/".parse().unwrap(),
            HeaderMap::new(),
            Bytes::new(),
        );
        let mut uri_cursor = UriCursor::new("/item/").unwrap();
        match handler
            .handle(&mut request, &mut uri_cursor, &Parameters::new())
            .unwrap()
        {
            Outcome::Response(response) => response,
            Outcome::NotFound => panic!("unexpected not found"),
        }
    }

    fn handler() -> MethodHandler {
        MethodHandler::builder()
            .post(|_request| Ok(Response::ok_text("post")))
            .get(|_request| Ok(Response::ok_text("get")))
            .build()
    }

    #[test]
    fn test_dispatch_1() {
        let handler = handler();
        assert_eq!(handle(&handler, Method::GET).body(), "get");
        assert_eq!(handle(&handler, Method::POST).body(), "post");
    }

    #[test]
    fn test_not_allowed_1() {
        let response = handle(&handler(), Method::DELETE);
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers().get(header::ALLOW).unwrap(), "GET, POST");
    }

    #[test]
    fn test_options_1() {
        let response = handle(&handler(), Method::OPTIONS);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::ALLOW).unwrap(),
            "GET, POST, OPTIONS"
        );
        assert_eq!(response.headers().get(header::CONTENT_LENGTH).unwrap(), "0");
    }

    #[test]
    fn test_options_2() {
        let handler = MethodHandler::builder()
            .method(Method::OPTIONS, |_request| Ok(Response::ok_text("custom")))
            .build();
        assert_eq!(handle(&handler, Method::OPTIONS).body(), "custom");
    }

    #[test]
    fn test_auth_1() {
        let handler = MethodHandler::builder()
            .auth(|request| {
                if request.method() == Method::DELETE {
                    Ok(Some(Response::error(StatusCode::FORBIDDEN)))
                } else {
                    Ok(None)
                }
            })
            .get(|_request| Ok(Response::ok_text("get")))
            .delete(|_request| Ok(Response::ok_text("delete")))
            .build();

        assert_eq!(handle(&handler, Method::GET).body(), "get");
        assert_eq!(
            handle(&handler, Method::DELETE).status(),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn test_error_1() {
        let handler = MethodHandler::builder()
            .put(|_request| Err(anyhow!("storage failed")))
            .build();
        let mut request = Request::new(
            Method::PUT,
            "/".parse().unwrap(),
            HeaderMap::new(),
            Bytes::new(),
        );
        let mut uri_cursor = UriCursor::new("/").unwrap();
        let error = handler
            .handle(&mut request, &mut uri_cursor, &Parameters::new())
            .unwrap_err();
        assert_eq!(error.to_string(), "storage failed");
    }

    #[test]
    fn test_allowed_methods_order() {
        let handler = MethodHandler::builder()
            .delete(|_request| Ok(Response::ok_empty()))
            .patch(|_request| Ok(Response::ok_empty()))
            .get(|_request| Ok(Response::ok_empty()))
            .get(|_request| Ok(Response::ok_text("replaced")))
            .build();
        assert_eq!(
            handler.allowed_methods().cloned().collect::<Vec<_>>(),
            [Method::GET, Method::PATCH, Method::DELETE]
        );
        assert_eq!(handle(&handler, Method::GET).body(), "replaced");
    }
}
