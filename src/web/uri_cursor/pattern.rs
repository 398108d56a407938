//! Path pattern mini-language.
//!
//! A pattern is a sequence of literal text and placeholders written as
//! `<converter:capture_name>`, for example `users/<int:id>/` or `<str:name>-<date:day>/`. It must
//! end with [`SEPARATOR`], so a successful match always consumes whole segments.
//!
//! Matching walks tokens left to right and never backtracks: each placeholder keeps what its
//! converter took, even if a different split would let the rest of the pattern match.

use super::{
    Parameters, SEPARATOR,
    converter::{Converter, ConverterRegistry, Width, name_validate},
};
use derive_more::{Display, Error};
use std::{collections::HashSet, fmt, iter, str::FromStr, sync::Arc};

const PLACEHOLDER_OPEN: char = '<';
const PLACEHOLDER_CLOSE: char = '>';
const PLACEHOLDER_DELIMITER: char = ':';

#[derive(Clone, PartialEq, Eq, Debug, Display)]
pub enum PatternSyntaxErrorKind {
    #[display("pattern must end with {SEPARATOR:?}")]
    MissingTrailingSeparator,
    #[display("placeholder opened at {position} is not closed")]
    UnclosedPlaceholder { position: usize },
    #[display("unexpected {PLACEHOLDER_CLOSE:?} at {position}")]
    UnopenedPlaceholder { position: usize },
    #[display("placeholder {placeholder:?} has no converter name")]
    MissingConverterName { placeholder: String },
    #[display("placeholder {placeholder:?} has no capture name")]
    MissingCaptureName { placeholder: String },
    #[display("capture name {name:?} is not an identifier")]
    InvalidCaptureName { name: String },
    #[display("unknown converter {name:?}")]
    UnknownConverter { name: String },
    #[display("capture name {name:?} used more than once")]
    DuplicateCaptureName { name: String },
}

#[derive(Clone, PartialEq, Eq, Debug, Display, Error)]
#[display("invalid pattern {pattern:?}: {kind}")]
pub struct PatternSyntaxError {
    pub pattern: String,
    pub kind: PatternSyntaxErrorKind,
}

enum Token {
    Literal(String),
    Placeholder {
        capture_name: String,
        converter: Arc<dyn Converter>,
    },
}

/// Result of a successful [`Pattern::match_prefix`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct PatternMatch {
    /// Consumed part of the path, always ending with [`SEPARATOR`].
    pub prefix: String,
    pub parameters: Parameters,
}

pub struct Pattern {
    source: String,
    tokens: Box<[Token]>,
}
impl Pattern {
    /// Compiles pattern using built in converters.
    pub fn new(source: &str) -> Result<Self, PatternSyntaxError> {
        Self::compile(source, ConverterRegistry::builtin())
    }

    pub fn compile(
        source: &str,
        converters: &ConverterRegistry,
    ) -> Result<Self, PatternSyntaxError> {
        let error = |kind| PatternSyntaxError {
            pattern: source.to_owned(),
            kind,
        };

        if !source.ends_with(SEPARATOR) {
            return Err(error(PatternSyntaxErrorKind::MissingTrailingSeparator));
        }

        let mut tokens = Vec::<Token>::new();
        let mut capture_names = HashSet::<&str>::new();
        let mut literal = String::new();
        let mut characters = source.char_indices();

        while let Some((position, character)) = characters.next() {
            match character {
                PLACEHOLDER_OPEN => {
                    let start = position + PLACEHOLDER_OPEN.len_utf8();
                    let end = characters
                        .by_ref()
                        .find(|(_, character)| *character == PLACEHOLDER_CLOSE)
                        .map(|(end, _)| end)
                        .ok_or_else(|| {
                            error(PatternSyntaxErrorKind::UnclosedPlaceholder { position })
                        })?;
                    let placeholder = &source[start..end];
                    if placeholder.contains(PLACEHOLDER_OPEN) {
                        return Err(error(PatternSyntaxErrorKind::UnclosedPlaceholder {
                            position,
                        }));
                    }

                    let (converter_name, capture_name) = placeholder
                        .split_once(PLACEHOLDER_DELIMITER)
                        .unwrap_or((placeholder, ""));
                    if converter_name.is_empty() {
                        return Err(error(PatternSyntaxErrorKind::MissingConverterName {
                            placeholder: placeholder.to_owned(),
                        }));
                    }
                    if capture_name.is_empty() {
                        return Err(error(PatternSyntaxErrorKind::MissingCaptureName {
                            placeholder: placeholder.to_owned(),
                        }));
                    }
                    if !name_validate(capture_name) {
                        return Err(error(PatternSyntaxErrorKind::InvalidCaptureName {
                            name: capture_name.to_owned(),
                        }));
                    }
                    let converter = converters.get(converter_name).ok_or_else(|| {
                        error(PatternSyntaxErrorKind::UnknownConverter {
                            name: converter_name.to_owned(),
                        })
                    })?;
                    if !capture_names.insert(capture_name) {
                        return Err(error(PatternSyntaxErrorKind::DuplicateCaptureName {
                            name: capture_name.to_owned(),
                        }));
                    }

                    if !literal.is_empty() {
                        tokens.push(Token::Literal(std::mem::take(&mut literal)));
                    }
                    tokens.push(Token::Placeholder {
                        capture_name: capture_name.to_owned(),
                        converter: converter.clone(),
                    });
                }
                PLACEHOLDER_CLOSE => {
                    return Err(error(PatternSyntaxErrorKind::UnopenedPlaceholder {
                        position,
                    }));
                }
                character => literal.push(character),
            }
        }
        // pattern ends with separator, so there is always trailing literal
        tokens.push(Token::Literal(literal));

        Ok(Self {
            source: source.to_owned(),
            tokens: tokens.into_boxed_slice(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }
    pub fn capture_names(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().filter_map(|token| match token {
            Token::Literal(_) => None,
            Token::Placeholder { capture_name, .. } => Some(capture_name.as_str()),
        })
    }

    /// Tries to consume beginning of `remaining`.
    ///
    /// `None` means the pattern does not apply, nothing is captured in that case.
    pub fn match_prefix(
        &self,
        remaining: &str,
    ) -> Option<PatternMatch> {
        let mut offset = 0;
        let mut parameters = Parameters::new();

        for (index, token) in self.tokens.iter().enumerate() {
            let rest = &remaining[offset..];
            match token {
                Token::Literal(literal) => {
                    if !rest.starts_with(literal.as_str()) {
                        return None;
                    }
                    offset += literal.len();
                }
                Token::Placeholder {
                    capture_name,
                    converter,
                } => {
                    let candidate_length = match converter.width() {
                        Width::Fixed(characters) => fixed_candidate_length(rest, characters)?,
                        Width::Variable => match self.tokens.get(index + 1) {
                            Some(Token::Literal(literal)) => {
                                variable_candidate_length(rest, literal)?
                            }
                            _ => rest.len(),
                        },
                    };
                    let candidate = &rest[..candidate_length];

                    let (length, value) = converter.convert(candidate)?;
                    if !candidate.is_char_boundary(length) {
                        log::warn!(
                            "converter for {capture_name:?} returned invalid length {length} for {candidate:?}"
                        );
                        return None;
                    }

                    parameters.insert(capture_name.clone(), value);
                    offset += length;
                }
            }
        }

        let prefix = &remaining[..offset];
        debug_assert!(prefix.ends_with(SEPARATOR));
        Some(PatternMatch {
            prefix: prefix.to_owned(),
            parameters,
        })
    }
}
impl FromStr for Pattern {
    type Err = PatternSyntaxError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        Self::new(source)
    }
}
impl fmt::Debug for Pattern {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}
impl fmt::Display for Pattern {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Byte length of first `characters` characters of `rest`, if there are that many.
fn fixed_candidate_length(
    rest: &str,
    characters: usize,
) -> Option<usize> {
    rest.char_indices()
        .map(|(position, _)| position)
        .chain(iter::once(rest.len()))
        .nth(characters)
}

/// Byte length of `rest` up to the nearest `literal`, looking past the first character so the
/// candidate is never empty.
fn variable_candidate_length(
    rest: &str,
    literal: &str,
) -> Option<usize> {
    let skip = rest.chars().next()?.len_utf8();
    rest[skip..]
        .find(literal)
        .map(|position| position + skip)
}
