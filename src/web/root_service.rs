use super::{
    Handler, Request, Response,
    uri_cursor::{Handler as UriCursorHandler, Outcome, Parameters, SEPARATOR, UriCursor},
};
use anyhow::{Error, ensure};
use percent_encoding::percent_decode_str;

/// Mounts routing tree under `prefix` and turns its outcomes into responses.
///
/// Routing works on percent-decoded path, paths not decoding to UTF-8 end with 400. Paths outside
/// `prefix` and [`Outcome::NotFound`] end with 404, handler errors are logged and end with 500.
pub struct RootService<H: UriCursorHandler> {
    prefix: String,
    handler: H,
    parameters: Parameters,
}
impl<H: UriCursorHandler> RootService<H> {
    pub fn new(
        prefix: &str,
        handler: H,
    ) -> Result<Self, Error> {
        ensure!(
            prefix.starts_with(SEPARATOR),
            "prefix {prefix:?} must start with {SEPARATOR:?}"
        );
        ensure!(
            prefix.ends_with(SEPARATOR),
            "prefix {prefix:?} must end with {SEPARATOR:?}"
        );

        Ok(Self {
            prefix: prefix.to_owned(),
            handler,
            parameters: Parameters::new(),
        })
    }

    /// Parameters handed to the handler with every request, eg. captured by an outer router
    /// that mounts this service.
    pub fn with_parameters(
        mut self,
        parameters: Parameters,
    ) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
    pub fn handler(&self) -> &H {
        &self.handler
    }
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    fn respond(
        &self,
        mut request: Request,
    ) -> Result<Response, Error> {
        let path = match percent_decode_str(request.path()).decode_utf8() {
            Ok(path) => path.into_owned(),
            Err(error) => return Ok(Response::error_400_from_error(error)),
        };
        if !path.starts_with(&self.prefix) {
            return Ok(Response::error_404());
        }

        let mut uri_cursor = UriCursor::new(&path)?;
        if self.prefix.len() > SEPARATOR.len_utf8() {
            uri_cursor.advance(&self.prefix[SEPARATOR.len_utf8()..])?;
        }

        let outcome = self
            .handler
            .handle(&mut request, &mut uri_cursor, &self.parameters)?;
        let response = match outcome {
            Outcome::Response(response) => response,
            Outcome::NotFound => Response::error_404(),
        };
        Ok(response)
    }
}
impl<H: UriCursorHandler> Handler for RootService<H> {
    fn handle(
        &self,
        request: Request,
    ) -> Response {
        let method = request.method().clone();
        let path = request.path().to_owned();

        match self.respond(request) {
            Ok(response) => {
                log::trace!("{method} {path}: {}", response.status());
                response
            }
            Err(error) => {
                log::error!("{method} {path}: {error:?}");
                Response::error_500()
            }
        }
    }
}
