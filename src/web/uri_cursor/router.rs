//! Hierarchical router.
//!
//! Every [`Router`] is a [`Handler`] itself, so routers nest: each one consumes part of the
//! remaining path and hands the rest to the next handler. Resolution order for one router:
//!
//! 1. `prepare` hook, may answer immediately (eg. authorization),
//! 2. root handler, if nothing remains in the path,
//! 3. route table, in declaration order, first matching pattern wins,
//! 4. path handler, if something remains in the path,
//! 5. cascade handlers, in declaration order, skipping those answering [`Outcome::NotFound`],
//! 6. [`Outcome::NotFound`].
//!
//! Steps 2 - 6 run inside the optional `dispatch` hook.

use super::{
    Handler, Outcome, Parameters, UriCursor,
    converter::ConverterRegistry,
    pattern::{Pattern, PatternMatch},
};
use crate::web::{Request, Response};
use anyhow::{Context, Error, ensure};
use std::{collections::HashSet, fmt};

pub type PrepareFn =
    dyn Fn(&mut Request, &Parameters) -> Result<Option<Response>, Error> + Send + Sync;
pub type DispatchFn =
    dyn Fn(&mut Request, &mut UriCursor, &Parameters, Next<'_>) -> Result<Outcome, Error>
        + Send
        + Sync;

/// Continuation of routing, handed to the `dispatch` hook.
pub struct Next<'r> {
    router: &'r Router,
}
impl Next<'_> {
    pub fn run(
        self,
        request: &mut Request,
        uri_cursor: &mut UriCursor,
        parameters: &Parameters,
    ) -> Result<Outcome, Error> {
        self.router.route(request, uri_cursor, parameters)
    }
}

struct Route {
    pattern: Pattern,
    handler: Box<dyn Handler>,
}

pub struct Router {
    prepare: Option<Box<PrepareFn>>,
    dispatch: Option<Box<DispatchFn>>,

    root_handler: Option<Box<dyn Handler>>,
    routes: Box<[Route]>,
    path_handler: Option<Box<dyn Handler>>,
    cascade: Box<[Box<dyn Handler>]>,
}
impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    pub fn patterns(&self) -> impl Iterator<Item = &Pattern> {
        self.routes.iter().map(|route| &route.pattern)
    }

    fn route(
        &self,
        request: &mut Request,
        uri_cursor: &mut UriCursor,
        parameters: &Parameters,
    ) -> Result<Outcome, Error> {
        if uri_cursor.is_terminal() {
            if let Some(root_handler) = &self.root_handler {
                log::trace!("{:?}: root handler", uri_cursor.parent());
                return root_handler.handle(request, uri_cursor, parameters);
            }
        }

        for route in self.routes.iter() {
            let Some(PatternMatch {
                prefix,
                parameters: captured,
            }) = route.pattern.match_prefix(uri_cursor.remaining())
            else {
                continue;
            };
            log::trace!(
                "{:?}: pattern {} matched {:?}",
                uri_cursor.parent(),
                route.pattern,
                prefix
            );

            uri_cursor.advance(&prefix).context("advance")?;
            let parameters = parameters.merged(captured);
            return route.handler.handle(request, uri_cursor, &parameters);
        }

        if !uri_cursor.is_terminal() {
            if let Some(path_handler) = &self.path_handler {
                log::trace!(
                    "{:?}: path handler for {:?}",
                    uri_cursor.parent(),
                    uri_cursor.remaining()
                );
                return path_handler.handle(request, uri_cursor, parameters);
            }
        }

        // alternatives answering not found leave neither cursor nor extensions modified
        for (index, handler) in self.cascade.iter().enumerate() {
            let mut attempt = uri_cursor.clone();
            let extensions = request.extensions().clone();
            match handler.handle(request, &mut attempt, parameters)? {
                Outcome::NotFound => {
                    log::trace!("{:?}: cascade #{index} not found", uri_cursor.parent());
                    *request.extensions_mut() = extensions;
                    continue;
                }
                outcome => {
                    *uri_cursor = attempt;
                    return Ok(outcome);
                }
            }
        }

        Ok(Outcome::NotFound)
    }
}
impl Handler for Router {
    fn handle(
        &self,
        request: &mut Request,
        uri_cursor: &mut UriCursor,
        parameters: &Parameters,
    ) -> Result<Outcome, Error> {
        if let Some(prepare) = &self.prepare {
            if let Some(response) = prepare(request, parameters)? {
                return Ok(Outcome::Response(response));
            }
        }

        match &self.dispatch {
            Some(dispatch) => dispatch(request, uri_cursor, parameters, Next { router: self }),
            None => self.route(request, uri_cursor, parameters),
        }
    }
}
impl fmt::Debug for Router {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Router")
            .field("prepare", &self.prepare.is_some())
            .field("dispatch", &self.dispatch.is_some())
            .field("root_handler", &self.root_handler.is_some())
            .field(
                "routes",
                &self.patterns().map(Pattern::source).collect::<Vec<_>>(),
            )
            .field("path_handler", &self.path_handler.is_some())
            .field("cascade", &self.cascade.len())
            .finish()
    }
}

/// Collects router configuration, patterns are compiled by [`RouterBuilder::build`].
pub struct RouterBuilder {
    converters: Option<ConverterRegistry>,

    prepare: Option<Box<PrepareFn>>,
    dispatch: Option<Box<DispatchFn>>,

    root_handler: Option<Box<dyn Handler>>,
    routes: Vec<(String, Box<dyn Handler>)>,
    path_handler: Option<Box<dyn Handler>>,
    cascade: Vec<Box<dyn Handler>>,
}
impl RouterBuilder {
    pub fn new() -> Self {
        Self {
            converters: None,
            prepare: None,
            dispatch: None,
            root_handler: None,
            routes: Vec::new(),
            path_handler: None,
            cascade: Vec::new(),
        }
    }

    /// Converters used for compiling route patterns, built in ones by default.
    pub fn converters(
        mut self,
        converters: ConverterRegistry,
    ) -> Self {
        self.converters = Some(converters);
        self
    }

    /// Runs before anything else, may answer on behalf of the whole router.
    ///
    /// Receives parameters captured by parents, typically to interpret them and attach the
    /// results to the request.
    pub fn prepare<F>(
        mut self,
        prepare: F,
    ) -> Self
    where
        F: Fn(&mut Request, &Parameters) -> Result<Option<Response>, Error> + Send + Sync + 'static,
    {
        self.prepare = Some(Box::new(prepare));
        self
    }

    /// Wraps the routing itself, eg. to post process responses or translate errors.
    pub fn dispatch<F>(
        mut self,
        dispatch: F,
    ) -> Self
    where
        F: Fn(&mut Request, &mut UriCursor, &Parameters, Next<'_>) -> Result<Outcome, Error>
            + Send
            + Sync
            + 'static,
    {
        self.dispatch = Some(Box::new(dispatch));
        self
    }

    pub fn root<H: Handler + 'static>(
        mut self,
        handler: H,
    ) -> Self {
        self.root_handler = Some(Box::new(handler));
        self
    }

    pub fn route<H: Handler + 'static>(
        mut self,
        pattern: &str,
        handler: H,
    ) -> Self {
        self.routes.push((pattern.to_owned(), Box::new(handler)));
        self
    }

    pub fn path<H: Handler + 'static>(
        mut self,
        handler: H,
    ) -> Self {
        self.path_handler = Some(Box::new(handler));
        self
    }

    pub fn cascade<H: Handler + 'static>(
        mut self,
        handler: H,
    ) -> Self {
        self.cascade.push(Box::new(handler));
        self
    }

    pub fn build(self) -> Result<Router, Error> {
        // function item would require 'static borrow of self.converters
        #[allow(clippy::redundant_closure)]
        let converters = self
            .converters
            .as_ref()
            .unwrap_or_else(|| ConverterRegistry::builtin());

        let mut sources = HashSet::<&str>::new();
        for (source, _) in self.routes.iter() {
            ensure!(sources.insert(source), "duplicated route pattern: {source:?}");
        }

        let routes = self
            .routes
            .into_iter()
            .map(|(source, handler)| {
                let pattern = Pattern::compile(&source, converters)
                    .with_context(|| format!("route {source:?}"))?;
                Ok(Route { pattern, handler })
            })
            .collect::<Result<Box<[_]>, Error>>()?;

        Ok(Router {
            prepare: self.prepare,
            dispatch: self.dispatch,
            root_handler: self.root_handler,
            routes,
            path_handler: self.path_handler,
            cascade: self.cascade.into_boxed_slice(),
        })
    }
}
impl Default for RouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}
