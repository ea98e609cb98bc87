//! Tokenizer for query expressions.
//!
//! The language is a small, Python-flavored boolean syntax:
//! `Title == "x" or (Number >= 2 and not Checkbox)`. Property names that are not
//! plain identifiers can be written in backticks: `` `Due date` < "2022-03-25" ``.

use std::fmt;
use std::hash::Hash;
use std::ops::Range;

use chumsky::error::SimpleReason;
use chumsky::prelude::*;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
  Ident(String),
  Str(String),
  Int(i64),
  /// Decimal literal as written, without digit separators
  Float(String),
  True,
  False,
  None,
  And,
  Or,
  Not,
  Is,
  In,
  EqEq,
  NotEq,
  Lt,
  Le,
  Gt,
  Ge,
  LParen,
  RParen,
  LBracket,
  RBracket,
  Comma,
  Minus,
}

impl fmt::Display for Token {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Token::Ident(s) => write!(f, "{}", s),
      Token::Str(s) => write!(f, "{:?}", s),
      Token::Int(n) => write!(f, "{}", n),
      Token::Float(n) => write!(f, "{}", n),
      Token::True => write!(f, "True"),
      Token::False => write!(f, "False"),
      Token::None => write!(f, "None"),
      Token::And => write!(f, "and"),
      Token::Or => write!(f, "or"),
      Token::Not => write!(f, "not"),
      Token::Is => write!(f, "is"),
      Token::In => write!(f, "in"),
      Token::EqEq => write!(f, "=="),
      Token::NotEq => write!(f, "!="),
      Token::Lt => write!(f, "<"),
      Token::Le => write!(f, "<="),
      Token::Gt => write!(f, ">"),
      Token::Ge => write!(f, ">="),
      Token::LParen => write!(f, "("),
      Token::RParen => write!(f, ")"),
      Token::LBracket => write!(f, "["),
      Token::RBracket => write!(f, "]"),
      Token::Comma => write!(f, ","),
      Token::Minus => write!(f, "-"),
    }
  }
}

/// Byte range of a token in the source
pub type Span = Range<usize>;

/// Tokenizes `source`, keeping each token's byte span.
pub fn tokenize(source: &str) -> Result<Vec<(Token, Span)>> {
  lexer().parse(source).map_err(syntax_error)
}

pub fn lexer() -> impl Parser<char, Vec<(Token, Span)>, Error = Simple<char>> {
  let escape = just('\\').ignore_then(choice((
    just('n').to('\n'),
    just('t').to('\t'),
    just('\\'),
    just('"'),
    just('\''),
  )));

  let string = |quote: char| {
    just(quote)
      .ignore_then(
        filter(move |c: &char| *c != quote && *c != '\\')
          .or(escape.clone())
          .repeated(),
      )
      .then_ignore(just(quote))
      .collect::<String>()
      .map(Token::Str)
  };

  let quoted_ident = filter(|c: &char| *c != '`')
    .repeated()
    .at_least(1)
    .collect::<String>()
    .delimited_by(just('`'), just('`'))
    .map(Token::Ident);

  // `_` separates digit groups, as in 1_000
  let digits = filter(|c: &char| c.is_ascii_digit())
    .then(filter(|c: &char| c.is_ascii_digit() || *c == '_').repeated())
    .map(|(first, rest): (char, Vec<char>)| {
      std::iter::once(first).chain(rest).filter(|c| *c != '_').collect::<String>()
    });

  let number = digits
    .clone()
    .then(just('.').ignore_then(digits).or_not())
    .try_map(|(whole, fraction), span: Span| match fraction {
      Some(fraction) => Ok(Token::Float(format!("{}.{}", whole, fraction))),
      None => whole
        .parse::<i64>()
        .map(Token::Int)
        .map_err(|_| Simple::custom(span, format!("integer `{}` is out of range", whole))),
    });

  let word = filter(|c: &char| c.is_alphabetic() || *c == '_')
    .then(filter(|c: &char| c.is_alphanumeric() || *c == '_').repeated())
    .map(|(first, rest): (char, Vec<char>)| {
      let word: String = std::iter::once(first).chain(rest).collect();
      match word.as_str() {
        "and" => Token::And,
        "or" => Token::Or,
        "not" => Token::Not,
        "is" => Token::Is,
        "in" => Token::In,
        "True" => Token::True,
        "False" => Token::False,
        "None" => Token::None,
        _ => Token::Ident(word),
      }
    });

  let punctuation = choice((
    just("==").to(Token::EqEq),
    just("!=").to(Token::NotEq),
    just("<=").to(Token::Le),
    just(">=").to(Token::Ge),
    just('<').to(Token::Lt),
    just('>').to(Token::Gt),
    just('(').to(Token::LParen),
    just(')').to(Token::RParen),
    just('[').to(Token::LBracket),
    just(']').to(Token::RBracket),
    just(',').to(Token::Comma),
    just('-').to(Token::Minus),
  ));

  choice((string('"'), string('\''), quoted_ident, number, word, punctuation))
    .map_with_span(|token, span| (token, span))
    .padded()
    .repeated()
    .then_ignore(end())
}

/// Turns the first parse error into [`Error::CompilerSyntax`].
pub(crate) fn syntax_error<T: fmt::Display + Hash + Eq>(errors: Vec<Simple<T>>) -> Error {
  let Some(error) = errors.into_iter().next() else {
    return Error::CompilerSyntax("invalid expression".to_string());
  };
  let message = match error.reason() {
    SimpleReason::Custom(message) => message.clone(),
    SimpleReason::Unclosed { delimiter, .. } => format!("unclosed `{}`", delimiter),
    SimpleReason::Unexpected => match error.found() {
      Some(found) => format!("unexpected `{}`", found),
      None => "unexpected end of expression".to_string(),
    },
  };
  Error::CompilerSyntax(format!("{} at offset {}", message, error.span().start))
}
