pub mod converter;
pub mod lazy_handler;
pub mod method_handler;
pub mod pattern;
pub mod router;

use super::{Request, Response};
use anyhow::Error;
use converter::Value;
use derive_more::{Display, Error as DeriveError};
use serde::Serialize;
use std::{collections::BTreeMap, sync::Arc};

pub const SEPARATOR: char = '/';

#[derive(Clone, PartialEq, Eq, Debug, Display, DeriveError)]
#[display("path {path:?} does not start with {SEPARATOR:?}")]
pub struct PathNotAbsolute {
    pub path: String,
}

#[derive(Clone, PartialEq, Eq, Debug, Display, DeriveError)]
pub enum InvalidAdvance {
    #[display("prefix {prefix:?} does not end with {SEPARATOR:?}")]
    MissingSeparator { prefix: String },
    #[display("prefix {prefix:?} is not a prefix of remaining path {remaining:?}")]
    NotPrefix { prefix: String, remaining: String },
}

/// Tracks how much of the request path was already consumed by parent handlers.
///
/// `parent() + remaining() == path()` always holds and `parent()` always ends with
/// [`SEPARATOR`]. The consumed part only ever grows, through [`UriCursor::advance`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct UriCursor {
    path: Arc<str>,
    consumed: usize,
}
impl UriCursor {
    pub fn new(path: &str) -> Result<Self, PathNotAbsolute> {
        if !path.starts_with(SEPARATOR) {
            return Err(PathNotAbsolute {
                path: path.to_owned(),
            });
        }

        Ok(Self {
            path: Arc::from(path),
            consumed: SEPARATOR.len_utf8(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
    pub fn parent(&self) -> &str {
        &self.path[..self.consumed]
    }
    pub fn remaining(&self) -> &str {
        &self.path[self.consumed..]
    }
    pub fn consumed(&self) -> usize {
        self.consumed
    }
    pub fn is_terminal(&self) -> bool {
        self.remaining().is_empty()
    }

    pub fn advance(
        &mut self,
        prefix: &str,
    ) -> Result<(), InvalidAdvance> {
        if !prefix.ends_with(SEPARATOR) {
            return Err(InvalidAdvance::MissingSeparator {
                prefix: prefix.to_owned(),
            });
        }
        if !self.remaining().starts_with(prefix) {
            return Err(InvalidAdvance::NotPrefix {
                prefix: prefix.to_owned(),
                remaining: self.remaining().to_owned(),
            });
        }

        self.consumed += prefix.len();
        Ok(())
    }
}


/// Named values captured from the path by parent routers.
#[derive(Clone, PartialEq, Eq, Default, Debug, Serialize)]
#[serde(transparent)]
pub struct Parameters {
    inner: BTreeMap<String, Value>,
}
impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.inner.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn get(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.inner.get(name)
    }
    pub fn get_int(
        &self,
        name: &str,
    ) -> Option<i64> {
        self.get(name).and_then(Value::as_int)
    }
    pub fn get_str(
        &self,
        name: &str,
    ) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }
    pub fn get_date(
        &self,
        name: &str,
    ) -> Option<chrono::NaiveDate> {
        self.get(name).and_then(Value::as_date)
    }

    pub fn insert(
        &mut self,
        name: String,
        value: Value,
    ) -> Option<Value> {
        self.inner.insert(name, value)
    }

    /// Returns `self` extended with `other`, values from `other` taking precedence.
    pub fn merged(
        &self,
        other: Parameters,
    ) -> Parameters {
        let mut inner = self.inner.clone();
        inner.extend(other.inner);
        Parameters { inner }
    }
}
impl FromIterator<(String, Value)> for Parameters {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests_parameters {
    use super::{Parameters, converter::Value};
    use chrono::NaiveDate;
    use maplit::btreemap;
    use serde_json::json;

    #[test]
    fn test_merged_1() {
        let parent = [
            ("a".to_owned(), Value::Int(1)),
            ("b".to_owned(), Value::Str("parent".to_owned())),
        ]
        .into_iter()
        .collect::<Parameters>();
        let captured = [("b".to_owned(), Value::Str("child".to_owned()))]
            .into_iter()
            .collect::<Parameters>();

        let merged = parent.merged(captured);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.get_int("a"), Some(1));
        assert_eq!(merged.get_str("b"), Some("child"));
        assert_eq!(parent.get_str("b"), Some("parent"));
    }

    #[test]
    fn test_typed_getters_1() {
        let mut parameters = Parameters::new();
        parameters.insert("id".to_owned(), Value::Int(-3));
        assert_eq!(parameters.get_int("id"), Some(-3));
        assert_eq!(parameters.get_str("id"), None);
        assert_eq!(parameters.get_date("id"), None);
        assert_eq!(parameters.get_int("missing"), None);
    }

    #[test]
    fn test_serialize_1() {
        let parameters = btreemap! {
            "day".to_owned() => Value::Date(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()),
            "id".to_owned() => Value::Int(7),
            "name".to_owned() => Value::Str("x".to_owned()),
        }
        .into_iter()
        .collect::<Parameters>();

        assert_eq!(
            serde_json::to_value(&parameters).unwrap(),
            json!({ "day": "2024-02-29", "id": 7, "name": "x" })
        );
    }
}

/// What a handler made of the request.
#[derive(Debug)]
pub enum Outcome {
    Response(Response),
    /// Nothing here handles this path, a parent may try other alternatives.
    NotFound,
}
impl Outcome {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}
impl From<Response> for Outcome {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

/// Handler taking part in hierarchical routing.
///
/// Receives the request, the cursor positioned after everything parents consumed and all
/// parameters captured on the way. Failures other than [`Outcome::NotFound`] are returned as
/// errors and are never interpreted by routers.
pub trait Handler: Send + Sync {
    fn handle(
        &self,
        request: &mut Request,
        uri_cursor: &mut UriCursor,
        parameters: &Parameters,
    ) -> Result<Outcome, Error>;
}
impl<H: Handler + ?Sized> Handler for &H {
    fn handle(
        &self,
        request: &mut Request,
        uri_cursor: &mut UriCursor,
        parameters: &Parameters,
    ) -> Result<Outcome, Error> {
        (**self).handle(request, uri_cursor, parameters)
    }
}
impl<H: Handler + ?Sized> Handler for Box<H> {
    fn handle(
        &self,
        request: &mut Request,
        uri_cursor: &mut UriCursor,
        parameters: &Parameters,
    ) -> Result<Outcome, Error> {
        (**self).handle(request, uri_cursor, parameters)
    }
}
impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn handle(
        &self,
        request: &mut Request,
        uri_cursor: &mut UriCursor,
        parameters: &Parameters,
    ) -> Result<Outcome, Error> {
        (**self).handle(request, uri_cursor, parameters)
    }
}

#[derive(derive_more::Debug)]
#[debug("HandlerFn")]
pub struct HandlerFn<F> {
    f: F,
}
impl<F> Handler for HandlerFn<F>
where
    F: Fn(&mut Request, &mut UriCursor, &Parameters) -> Result<Outcome, Error> + Send + Sync,
{
    fn handle(
        &self,
        request: &mut Request,
        uri_cursor: &mut UriCursor,
        parameters: &Parameters,
    ) -> Result<Outcome, Error> {
        (self.f)(request, uri_cursor, parameters)
    }
}

/// Wraps a closure as a [`Handler`].
pub fn handler_fn<F>(f: F) -> HandlerFn<F>
where
    F: Fn(&mut Request, &mut UriCursor, &Parameters) -> Result<Outcome, Error> + Send + Sync,
{
    HandlerFn { f }
}
