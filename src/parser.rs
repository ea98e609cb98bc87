//! Recursive-descent parser for query expressions, built from chumsky
//! combinators over the lexer's tokens.
//!
//! ```text
//! or         := and ("or" and)*
//! and        := not ("and" not)*
//! not        := "not" not | comparison
//! comparison := primary (compop primary)?
//! primary    := ident | literal | "(" or ")" | "[" literal ("," literal)* ","? "]"
//! compop     := "==" | "!=" | "is" | "is not" | "<" | "<=" | ">" | ">=" | "in" | "not in"
//! ```

use std::fmt;

use chumsky::prelude::*;
use chumsky::Stream;

use crate::error::{Error, Result};
use crate::lexer::{self, Span, Token};

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
  Str(String),
  Int(i64),
  Float(f64),
  Bool(bool),
  None,
}

impl fmt::Display for Literal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Literal::Str(s) => write!(f, "{:?}", s),
      Literal::Int(n) => write!(f, "{}", n),
      Literal::Float(n) => write!(f, "{}", n),
      Literal::Bool(true) => write!(f, "True"),
      Literal::Bool(false) => write!(f, "False"),
      Literal::None => write!(f, "None"),
    }
  }
}

/// One side of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
  Property(String),
  Literal(Literal),
  List(Vec<Literal>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
  Eq,
  NotEq,
  Is,
  IsNot,
  Lt,
  Le,
  Gt,
  Ge,
  In,
  NotIn,
}

impl CompareOp {
  /// Same comparison with the operands swapped.
  pub fn flipped(self) -> CompareOp {
    match self {
      CompareOp::Lt => CompareOp::Gt,
      CompareOp::Gt => CompareOp::Lt,
      CompareOp::Le => CompareOp::Ge,
      CompareOp::Ge => CompareOp::Le,
      other => other,
    }
  }
}

impl fmt::Display for CompareOp {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      CompareOp::Eq => "==",
      CompareOp::NotEq => "!=",
      CompareOp::Is => "is",
      CompareOp::IsNot => "is not",
      CompareOp::Lt => "<",
      CompareOp::Le => "<=",
      CompareOp::Gt => ">",
      CompareOp::Ge => ">=",
      CompareOp::In => "in",
      CompareOp::NotIn => "not in",
    };
    f.write_str(s)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
  Or(Vec<Expr>),
  And(Vec<Expr>),
  Not(Box<Expr>),
  Compare {
    left: Operand,
    op: CompareOp,
    right: Operand,
  },
  Operand(Operand),
}

/// Deepest nesting of groups and `not`s an expression may use
pub const MAX_NESTING: usize = 32;

pub fn parse(source: &str) -> Result<Expr> {
  let tokens = lexer::tokenize(source)?;
  check_nesting(&tokens)?;
  let end = source.len();
  parser()
    .parse(Stream::from_iter(end..end + 1, tokens.into_iter()))
    .map_err(lexer::syntax_error)
}

/// Parser over the tokens of a whole expression.
pub fn parser() -> impl Parser<Token, Expr, Error = Simple<Token>> + Clone {
  recursive(|expr| {
    let group = expr
      .delimited_by(just(Token::LParen), just(Token::RParen))
      .map(Primary::Group);
    let primary = operand()
      .map(Primary::Operand)
      .or(group)
      .map_with_span(|primary, span: Span| (primary, span));

    let comparison = primary
      .clone()
      .then(
        compare_op()
          .then(primary)
          .then(compare_op().map_with_span(|_, span: Span| span).or_not())
          .or_not(),
      )
      .try_map(|(left, rest), _| resolve_comparison(left, rest));

    let negation = recursive(|negation| {
      just(Token::Not)
        .ignore_then(negation)
        .map(|inner| Expr::Not(Box::new(inner)))
        .or(comparison)
    });

    let conjunction = negation
      .clone()
      .then(just(Token::And).ignore_then(negation).repeated())
      .map(|(first, rest)| join(first, rest, Expr::And));

    conjunction
      .clone()
      .then(just(Token::Or).ignore_then(conjunction).repeated())
      .map(|(first, rest)| join(first, rest, Expr::Or))
  })
  .then_ignore(end())
}

fn literal() -> impl Parser<Token, Literal, Error = Simple<Token>> + Clone {
  let number = filter_map(|span: Span, token: Token| match token {
    Token::Int(n) => Ok(Literal::Int(n)),
    Token::Float(text) => text
      .parse()
      .map(Literal::Float)
      .map_err(|_| Simple::custom(span, format!("invalid number `{}`", text))),
    other => Err(Simple::expected_input_found(span, None, Some(other))),
  });

  let signed = just(Token::Minus)
    .or_not()
    .then(number)
    .map(|(minus, literal)| match (minus, literal) {
      (Some(_), Literal::Int(n)) => Literal::Int(-n),
      (Some(_), Literal::Float(n)) => Literal::Float(-n),
      (_, literal) => literal,
    });

  let constant = select! {
    Token::Str(s) => Literal::Str(s),
    Token::True => Literal::Bool(true),
    Token::False => Literal::Bool(false),
    Token::None => Literal::None,
  };

  signed.or(constant)
}

fn operand() -> impl Parser<Token, Operand, Error = Simple<Token>> + Clone {
  let property = select! { Token::Ident(name) => Operand::Property(name) };

  let list = literal()
    .separated_by(just(Token::Comma))
    .allow_trailing()
    .delimited_by(just(Token::LBracket), just(Token::RBracket))
    .map(Operand::List);

  choice((property, list, literal().map(Operand::Literal)))
}

fn compare_op() -> impl Parser<Token, CompareOp, Error = Simple<Token>> + Clone {
  choice((
    just(Token::EqEq).to(CompareOp::Eq),
    just(Token::NotEq).to(CompareOp::NotEq),
    just(Token::Le).to(CompareOp::Le),
    just(Token::Ge).to(CompareOp::Ge),
    just(Token::Lt).to(CompareOp::Lt),
    just(Token::Gt).to(CompareOp::Gt),
    just(Token::In).to(CompareOp::In),
    just(Token::Is)
      .ignore_then(just(Token::Not).or_not())
      .map(|not| if not.is_some() { CompareOp::IsNot } else { CompareOp::Is }),
    just(Token::Not).then(just(Token::In)).to(CompareOp::NotIn),
  ))
}

/// Primary that was parsed: a comparison operand or a parenthesized group
#[derive(Debug, Clone)]
enum Primary {
  Operand(Operand),
  Group(Expr),
}

type Side = (Primary, Span);

fn resolve_comparison(
  (left, left_span): Side,
  rest: Option<((CompareOp, Side), Option<Span>)>,
) -> std::result::Result<Expr, Simple<Token>> {
  let ((op, right), chained) = match rest {
    Some(rest) => rest,
    None => {
      return Ok(match left {
        Primary::Operand(operand) => Expr::Operand(operand),
        Primary::Group(expr) => expr,
      })
    }
  };
  if let Some(span) = chained {
    return Err(Simple::custom(span, "chained comparisons are not supported"));
  }

  Ok(Expr::Compare {
    left: compared((left, left_span))?,
    op,
    right: compared(right)?,
  })
}

fn compared((primary, span): Side) -> std::result::Result<Operand, Simple<Token>> {
  match primary {
    Primary::Operand(operand) => Ok(operand),
    Primary::Group(_) => Err(Simple::custom(span, "a parenthesized expression cannot be compared")),
  }
}

fn join(first: Expr, rest: Vec<Expr>, combine: fn(Vec<Expr>) -> Expr) -> Expr {
  if rest.is_empty() {
    return first;
  }
  let mut items = Vec::with_capacity(rest.len() + 1);
  items.push(first);
  items.extend(rest);
  combine(items)
}

/// Rejects expressions nested deeper than [`MAX_NESTING`] before they are
/// parsed. A `not` stays open until the next `and`, `or` or closing
/// parenthesis at its own level.
fn check_nesting(tokens: &[(Token, Span)]) -> Result<()> {
  let mut open_nots = vec![0usize];
  let mut depth = 0;

  for (i, (token, span)) in tokens.iter().enumerate() {
    match token {
      Token::LParen => {
        open_nots.push(0);
        depth += 1;
      }
      Token::RParen if open_nots.len() > 1 => {
        let nots = open_nots.pop().unwrap_or_default();
        depth -= nots + 1;
      }
      Token::Not if !matches!(tokens.get(i + 1), Some((Token::In, _))) => {
        if let Some(nots) = open_nots.last_mut() {
          *nots += 1;
        }
        depth += 1;
      }
      Token::And | Token::Or => {
        if let Some(nots) = open_nots.last_mut() {
          depth -= *nots;
          *nots = 0;
        }
      }
      _ => continue,
    }

    if depth > MAX_NESTING {
      return Err(Error::CompilerSyntax(format!(
        "expression nests deeper than {} levels at offset {}",
        MAX_NESTING, span.start
      )));
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn prop(name: &str) -> Operand {
    Operand::Property(name.to_string())
  }

  fn compare(name: &str, op: CompareOp, literal: Literal) -> Expr {
    Expr::Compare {
      left: prop(name),
      op,
      right: Operand::Literal(literal),
    }
  }

  #[test]
  fn test_precedence() {
    let expr = parse("A == 1 or B == 2 and not C").unwrap();
    assert_eq!(
      expr,
      Expr::Or(vec![
        compare("A", CompareOp::Eq, Literal::Int(1)),
        Expr::And(vec![
          compare("B", CompareOp::Eq, Literal::Int(2)),
          Expr::Not(Box::new(Expr::Operand(prop("C")))),
        ]),
      ])
    );
  }

  #[test]
  fn test_grouping() {
    let expr = parse("(A or B) and C").unwrap();
    assert_eq!(
      expr,
      Expr::And(vec![
        Expr::Or(vec![Expr::Operand(prop("A")), Expr::Operand(prop("B"))]),
        Expr::Operand(prop("C")),
      ])
    );
  }

  #[test]
  fn test_two_word_operators() {
    assert_eq!(
      parse("A is not None").unwrap(),
      compare("A", CompareOp::IsNot, Literal::None)
    );
    assert_eq!(
      parse("'x' not in Tags").unwrap(),
      Expr::Compare {
        left: Operand::Literal(Literal::Str("x".into())),
        op: CompareOp::NotIn,
        right: prop("Tags"),
      }
    );
  }

  #[test]
  fn test_lists_and_negative_numbers() {
    assert_eq!(
      parse("N in [1, -2.5, 3,]").unwrap(),
      Expr::Compare {
        left: prop("N"),
        op: CompareOp::In,
        right: Operand::List(vec![Literal::Int(1), Literal::Float(-2.5), Literal::Int(3)]),
      }
    );
    assert_eq!(parse("N > -4").unwrap(), compare("N", CompareOp::Gt, Literal::Int(-4)));
  }

  #[test]
  fn test_flipped_operators() {
    assert_eq!(CompareOp::Lt.flipped(), CompareOp::Gt);
    assert_eq!(CompareOp::Ge.flipped(), CompareOp::Le);
    assert_eq!(CompareOp::Eq.flipped(), CompareOp::Eq);
  }

  #[test]
  fn test_syntax_errors() {
    for bad in [
      "A ==",
      "A == 1 == 2",
      "1 < A < 3",
      "(A or B) == 1",
      "(A",
      "A B",
      "A not B",
      "[1, 2",
      "- A",
      "and",
    ] {
      assert!(matches!(parse(bad), Err(Error::CompilerSyntax(_))), "{}", bad);
    }
  }

  #[test]
  fn test_nesting_limit() {
    let shallow = format!("{}A == 1{}", "(".repeat(16), ")".repeat(16));
    assert_eq!(parse(&shallow).unwrap(), compare("A", CompareOp::Eq, Literal::Int(1)));

    let deep = format!("{}A == 1{}", "(".repeat(2000), ")".repeat(2000));
    assert!(matches!(parse(&deep), Err(Error::CompilerSyntax(msg)) if msg.contains("nests deeper")));

    let negations = format!("{}A", "not ".repeat(MAX_NESTING + 1));
    assert!(matches!(parse(&negations), Err(Error::CompilerSyntax(_))));
  }

  #[test]
  fn test_sibling_groups_do_not_add_up() {
    let wide = vec!["(not A)"; MAX_NESTING * 2].join(" and ");
    assert!(parse(&wide).is_ok());
    let chain = vec!["not A"; MAX_NESTING * 2].join(" or ");
    assert!(parse(&chain).is_ok());
  }

  #[test]
  fn test_error_mentions_offset() {
    let err = parse("A == 1 == 2").unwrap_err();
    assert!(matches!(err, Error::CompilerSyntax(msg) if msg.contains("chained") && msg.contains("7")));
  }
}
