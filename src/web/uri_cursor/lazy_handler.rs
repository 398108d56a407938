//! Handlers referenced by name and constructed on first use.
//!
//! Lets routing configuration point at handlers that are expensive to build (or live in parts of
//! the application that may not be needed at all) without constructing them up front.

use super::{Handler, Outcome, Parameters, UriCursor};
use crate::web::Request;
use anyhow::{Context, Error, anyhow, ensure};
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, OnceLock},
};

pub type HandlerFactory = dyn Fn() -> Result<Arc<dyn Handler>, Error> + Send + Sync;

/// Handler factories keyed by stable name.
#[derive(Default)]
pub struct HandlerCatalog {
    factories: HashMap<String, Box<HandlerFactory>>,
}
impl HandlerCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(
        &mut self,
        key: &str,
        factory: F,
    ) -> Result<(), Error>
    where
        F: Fn() -> Result<Arc<dyn Handler>, Error> + Send + Sync + 'static,
    {
        ensure!(!key.is_empty(), "key must not be empty");
        ensure!(
            !self.factories.contains_key(key),
            "handler {key:?} already registered"
        );
        self.factories.insert(key.to_owned(), Box::new(factory));
        Ok(())
    }

    pub fn contains(
        &self,
        key: &str,
    ) -> bool {
        self.factories.contains_key(key)
    }

    /// Constructs a new instance of handler registered as `key`.
    pub fn resolve(
        &self,
        key: &str,
    ) -> Result<Arc<dyn Handler>, Error> {
        let factory = self
            .factories
            .get(key)
            .ok_or_else(|| anyhow!("handler {key:?} is not registered"))?;
        let handler = factory().with_context(|| format!("factory for {key:?}"))?;
        Ok(handler)
    }

    /// Creates handler that resolves `key` on first request.
    ///
    /// The key is not checked here, unknown keys fail at request time.
    pub fn lazy(
        self: &Arc<Self>,
        key: &str,
    ) -> LazyHandler {
        LazyHandler {
            catalog: self.clone(),
            key: key.to_owned(),
            handler: OnceLock::new(),
        }
    }
}
impl fmt::Debug for HandlerCatalog {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let mut keys = self.factories.keys().collect::<Vec<_>>();
        keys.sort();
        f.debug_struct("HandlerCatalog")
            .field("keys", &keys)
            .finish()
    }
}

/// Resolves its handler on first successful use and keeps it afterwards.
///
/// Resolution errors are returned as handler errors and retried with the next request.
pub struct LazyHandler {
    catalog: Arc<HandlerCatalog>,
    key: String,
    handler: OnceLock<Arc<dyn Handler>>,
}
impl LazyHandler {
    pub fn key(&self) -> &str {
        &self.key
    }
    pub fn is_resolved(&self) -> bool {
        self.handler.get().is_some()
    }

    fn handler(&self) -> Result<&Arc<dyn Handler>, Error> {
        if let Some(handler) = self.handler.get() {
            return Ok(handler);
        }

        let handler = self.catalog.resolve(&self.key)?;
        log::debug!("handler {:?} resolved", self.key);

        // concurrent resolution may have won, its handler is kept
        Ok(self.handler.get_or_init(|| handler))
    }
}
impl Handler for LazyHandler {
    fn handle(
        &self,
        request: &mut Request,
        uri_cursor: &mut UriCursor,
        parameters: &Parameters,
    ) -> Result<Outcome, Error> {
        self.handler()?.handle(request, uri_cursor, parameters)
    }
}
impl fmt::Debug for LazyHandler {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("LazyHandler")
            .field("key", &self.key)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

#[cfg(test)]
mod tests_lazy_handler {
    use super::HandlerCatalog;
    use crate::web::{
        Request, Response,
        uri_cursor::{Handler, Outcome, Parameters, UriCursor, handler_fn, router::Router},
    };
    use anyhow::{Error, anyhow};
    use bytes::Bytes;
    use http::{HeaderMap, Method};
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    fn run(
        handler: &dyn Handler,
        path: &str,
    ) -> Result<Outcome, Error> {
        let mut request = Request::new(
            Method::GET,
            path.parse().unwrap(),
            HeaderMap::new(),
            Bytes::new(),
        );
        let mut uri_cursor = UriCursor::new(path).unwrap();
        handler.handle(&mut request, &mut uri_cursor, &Parameters::new())
    }

    fn hello() -> Arc<dyn Handler> {
        Arc::new(handler_fn(|_request, _uri_cursor, _parameters| {
            Ok(Outcome::Response(Response::ok_text("hello")))
        }))
    }

    #[test]
    fn test_resolve_once_1() {
        let constructions = Arc::new(AtomicUsize::new(0));

        let mut catalog = HandlerCatalog::new();
        catalog
            .register("hello", {
                let constructions = constructions.clone();
                move || {
                    constructions.fetch_add(1, Ordering::SeqCst);
                    Ok(hello())
                }
            })
            .unwrap();
        let catalog = Arc::new(catalog);

        let lazy_handler = catalog.lazy("hello");
        assert_eq!(lazy_handler.key(), "hello");
        assert!(!lazy_handler.is_resolved());
        assert_eq!(constructions.load(Ordering::SeqCst), 0);

        for _ in 0..3 {
            match run(&lazy_handler, "/").unwrap() {
                Outcome::Response(response) => assert_eq!(response.body(), "hello"),
                Outcome::NotFound => panic!("unexpected not found"),
            }
        }
        assert!(lazy_handler.is_resolved());
        assert_eq!(constructions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_key_1() {
        let catalog = Arc::new(HandlerCatalog::new());
        let lazy_handler = catalog.lazy("missing");
        assert!(run(&lazy_handler, "/").is_err());
        assert!(!lazy_handler.is_resolved());
    }

    #[test]
    fn test_factory_error_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));

        let mut catalog = HandlerCatalog::new();
        catalog
            .register("flaky", {
                let attempts = attempts.clone();
                move || {
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(anyhow!("not ready yet"))
                    } else {
                        Ok(hello())
                    }
                }
            })
            .unwrap();
        let catalog = Arc::new(catalog);
        let lazy_handler = catalog.lazy("flaky");

        assert!(run(&lazy_handler, "/").is_err());
        assert!(run(&lazy_handler, "/").is_ok());
        assert!(run(&lazy_handler, "/").is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_register_1() {
        let mut catalog = HandlerCatalog::new();
        catalog.register("a", || Ok(hello())).unwrap();
        assert!(catalog.register("a", || Ok(hello())).is_err());
        assert!(catalog.register("", || Ok(hello())).is_err());
        assert!(catalog.contains("a"));
        assert!(!catalog.contains("b"));
    }

    #[test]
    fn test_in_router_1() {
        let mut catalog = HandlerCatalog::new();
        catalog.register("hello", || Ok(hello())).unwrap();
        let catalog = Arc::new(catalog);

        let router = Router::builder()
            .route("hello/", catalog.lazy("hello"))
            .route("broken/", catalog.lazy("broken"))
            .build()
            .unwrap();

        assert!(!run(&router, "/hello/").unwrap().is_not_found());
        assert!(run(&router, "/broken/").is_err());
        assert!(run(&router, "/other/").unwrap().is_not_found());
    }
}
