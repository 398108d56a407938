//! Named parsers turning a piece of path into a typed value.
//!
//! Every converter decides how much of the path it may take: [`Width::Variable`] converters
//! receive the remaining path cut at the next literal of the pattern, [`Width::Fixed`]
//! converters receive exactly the given number of characters.

use super::SEPARATOR;
use anyhow::{Error, ensure};
use chrono::NaiveDate;
use itertools::Itertools;
use regex::Regex;
use serde::Serialize;
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, LazyLock},
};
use uuid::Uuid;

#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Str(String),
    Date(NaiveDate),
    Uuid(Uuid),
}
impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Self::Date(value) => Some(*value),
            _ => None,
        }
    }
    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            Self::Uuid(value) => Some(*value),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Width {
    Variable,
    /// Exact number of characters.
    Fixed(usize),
}

pub trait Converter: Send + Sync {
    fn width(&self) -> Width {
        Width::Variable
    }

    /// Parses the beginning of `candidate`.
    ///
    /// Returns number of bytes taken (a char boundary, at most `candidate.len()`) and the parsed
    /// value, or `None` if `candidate` is not acceptable.
    fn convert(
        &self,
        candidate: &str,
    ) -> Option<(usize, Value)>;
}

fn regex_prefix_length(
    regex: &Regex,
    candidate: &str,
) -> Option<usize> {
    regex
        .find(candidate)
        .filter(|found| found.start() == 0 && !found.is_empty())
        .map(|found| found.end())
}

/// Optionally signed decimal integer.
#[derive(Debug)]
pub struct Int;
impl Converter for Int {
    fn convert(
        &self,
        candidate: &str,
    ) -> Option<(usize, Value)> {
        static REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[+-]?[0-9]+").unwrap());

        let length = regex_prefix_length(&REGEX, candidate)?;
        let value = candidate[..length].parse::<i64>().ok()?;
        Some((length, Value::Int(value)))
    }
}

/// Any non empty run of characters without separator.
#[derive(Debug)]
pub struct Str;
impl Converter for Str {
    fn convert(
        &self,
        candidate: &str,
    ) -> Option<(usize, Value)> {
        let length = candidate.find(SEPARATOR).unwrap_or(candidate.len());
        if length == 0 {
            return None;
        }
        Some((length, Value::Str(candidate[..length].to_owned())))
    }
}

/// ASCII letters, digits, hyphens and underscores.
#[derive(Debug)]
pub struct Slug;
impl Converter for Slug {
    fn convert(
        &self,
        candidate: &str,
    ) -> Option<(usize, Value)> {
        static REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+").unwrap());

        let length = regex_prefix_length(&REGEX, candidate)?;
        Some((length, Value::Str(candidate[..length].to_owned())))
    }
}

/// Calendar date written as `YYYY-MM-DD`.
#[derive(Debug)]
pub struct Date;
impl Date {
    const LENGTH: usize = 10;
}
impl Converter for Date {
    fn width(&self) -> Width {
        Width::Fixed(Self::LENGTH)
    }

    fn convert(
        &self,
        candidate: &str,
    ) -> Option<(usize, Value)> {
        let bytes = candidate.as_bytes().get(..Self::LENGTH)?;
        let well_formed = bytes.iter().enumerate().all(|(index, byte)| match index {
            4 | 7 => *byte == b'-',
            _ => byte.is_ascii_digit(),
        });
        if !well_formed {
            return None;
        }

        let text = &candidate[..Self::LENGTH];
        let year = text[0..4].parse::<i32>().ok()?;
        let month = text[5..7].parse::<u32>().ok()?;
        let day = text[8..10].parse::<u32>().ok()?;
        let value = NaiveDate::from_ymd_opt(year, month, day)?;

        Some((Self::LENGTH, Value::Date(value)))
    }
}

/// Hyphenated uuid, eg. `075194d3-6885-417e-a8a8-6c931e272f00`.
#[derive(Debug)]
pub struct UuidConverter;
impl UuidConverter {
    const LENGTH: usize = 36;
}
impl Converter for UuidConverter {
    fn width(&self) -> Width {
        Width::Fixed(Self::LENGTH)
    }

    fn convert(
        &self,
        candidate: &str,
    ) -> Option<(usize, Value)> {
        let text = candidate.get(..Self::LENGTH)?;
        let value = Uuid::try_parse(text).ok()?;
        Some((Self::LENGTH, Value::Uuid(value)))
    }
}

pub fn name_validate(name: &str) -> bool {
    let mut characters = name.chars();
    let Some(first) = characters.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && characters.all(|character| character.is_ascii_alphanumeric() || character == '_')
}

/// Converters available to pattern compilation, keyed by name.
// #[derive(Debug)] implemented manually
#[derive(Clone)]
pub struct ConverterRegistry {
    converters: HashMap<String, Arc<dyn Converter>>,
}
impl ConverterRegistry {
    pub fn empty() -> Self {
        Self {
            converters: HashMap::new(),
        }
    }

    /// Shared registry with built in converters only.
    pub fn builtin() -> &'static Self {
        static BUILTIN: LazyLock<ConverterRegistry> = LazyLock::new(ConverterRegistry::default);
        &BUILTIN
    }

    /// Adds converter under `name`, replacing previous one.
    pub fn register<C: Converter + 'static>(
        &mut self,
        name: &str,
        converter: C,
    ) -> Result<(), Error> {
        ensure!(name_validate(name), "invalid converter name: {name:?}");
        if self
            .converters
            .insert(name.to_owned(), Arc::new(converter))
            .is_some()
        {
            log::debug!("converter {name:?} replaced");
        }
        Ok(())
    }

    pub fn get(
        &self,
        name: &str,
    ) -> Option<&Arc<dyn Converter>> {
        self.converters.get(name)
    }
}
impl fmt::Debug for ConverterRegistry {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_set().entries(self.converters.keys().sorted()).finish()
    }
}
impl Default for ConverterRegistry {
    fn default() -> Self {
        let converters: [(&str, Arc<dyn Converter>); 5] = [
            ("int", Arc::new(Int)),
            ("str", Arc::new(Str)),
            ("slug", Arc::new(Slug)),
            ("date", Arc::new(Date)),
            ("uuid", Arc::new(UuidConverter)),
        ];
        Self {
            converters: converters
                .into_iter()
                .map(|(name, converter)| (name.to_owned(), converter))
                .collect(),
        }
    }
}
