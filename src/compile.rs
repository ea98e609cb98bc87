//! Compiles parsed expressions into filter trees.
//!
//! Every identifier is resolved against the database schema, and each
//! comparison becomes a leaf whose operator depends on the property type.
//! `not` is never sent to the server: it is pushed down to the leaves, where it
//! picks the complementary operator, and through combinators by De Morgan.

use serde_json::{json, Value};
use tracing::debug;

use crate::database::DatabaseSchema;
use crate::error::{Error, Result};
use crate::parser::{self, CompareOp, Expr, Literal, Operand, MAX_NESTING};
use crate::property::{is_iso_date, Family, FormulaType, PropertyType};
use crate::query::{Condition, FilterNode};

/// Deepest expression tree the compiler walks. Each parsed group adds at most
/// an `or` and an `and` level.
const MAX_DEPTH: usize = 2 * MAX_NESTING + 2;

/// Compiles `source` against `schema`. A blank expression matches everything.
pub fn compile(schema: &DatabaseSchema, source: &str) -> Result<FilterNode> {
  if source.trim().is_empty() {
    return Ok(FilterNode::empty());
  }
  let expr = parser::parse(source)?;
  let filter = Compiler::new(schema).compile(&expr)?;
  debug!(expression = source, depth = filter.depth(), "compiled filter");
  Ok(filter)
}

pub struct Compiler<'a> {
  schema: &'a DatabaseSchema,
}

/// A property resolved against the schema
#[derive(Clone, Copy)]
struct Column<'n> {
  name: &'n str,
  kind: PropertyType,
  formula: Option<FormulaType>,
}

impl Column<'_> {
  fn family(&self) -> Family {
    match self.formula {
      Some(result) => result.family(),
      None => self.kind.family(),
    }
  }
}

impl<'a> Compiler<'a> {
  pub fn new(schema: &'a DatabaseSchema) -> Self {
    Self { schema }
  }

  pub fn compile(&self, expr: &Expr) -> Result<FilterNode> {
    self.node(expr, false, 0)
  }

  fn node(&self, expr: &Expr, negated: bool, depth: usize) -> Result<FilterNode> {
    if depth > MAX_DEPTH {
      return Err(Error::CompilerSyntax(format!(
        "expression nests deeper than {} levels",
        MAX_DEPTH
      )));
    }
    match expr {
      Expr::Or(items) => {
        let children = self.children(items, negated, depth)?;
        Ok(combine(negated, children))
      }
      Expr::And(items) => {
        let children = self.children(items, negated, depth)?;
        Ok(combine(!negated, children))
      }
      Expr::Not(inner) => self.node(inner, !negated, depth + 1),
      Expr::Compare { left, op, right } => self.comparison(left, *op, right, negated),
      Expr::Operand(Operand::Property(name)) => {
        let column = self.column(name, None)?;
        let condition = match column.family() {
          Family::Checkbox => Condition::Equals(Value::Bool(true)),
          _ => Condition::IsNotEmpty,
        };
        self.leaf(column, condition, negated)
      }
      Expr::Operand(Operand::Literal(literal)) => Err(Error::CompilerSyntax(format!(
        "literal {} is not a condition",
        literal
      ))),
      Expr::Operand(Operand::List(_)) => {
        Err(Error::CompilerSyntax("a list is not a condition".to_string()))
      }
    }
  }

  fn children(&self, items: &[Expr], negated: bool, depth: usize) -> Result<Vec<FilterNode>> {
    items.iter().map(|item| self.node(item, negated, depth + 1)).collect()
  }

  fn comparison(
    &self,
    left: &Operand,
    op: CompareOp,
    right: &Operand,
    negated: bool,
  ) -> Result<FilterNode> {
    match (left, right) {
      (Operand::Property(name), value) => self.property_test(name, op, value, negated),
      (value, Operand::Property(name)) => match (op, value) {
        (CompareOp::In | CompareOp::NotIn, Operand::Literal(literal)) => {
          let column = self.column(name, Some(literal))?;
          let value = self.value(column, literal)?;
          let condition = if op == CompareOp::In {
            Condition::Contains(value)
          } else {
            Condition::DoesNotContain(value)
          };
          self.leaf(column, condition, negated)
        }
        (CompareOp::In | CompareOp::NotIn, _) => Err(Error::CompilerSyntax(format!(
          "left side of `{}` must be a single value",
          op
        ))),
        _ => self.property_test(name, op.flipped(), value, negated),
      },
      _ => Err(Error::CompilerSyntax(format!(
        "`{}` must compare a property with a value",
        op
      ))),
    }
  }

  /// `name op value`, with the property on the left.
  fn property_test(
    &self,
    name: &str,
    op: CompareOp,
    value: &Operand,
    negated: bool,
  ) -> Result<FilterNode> {
    let hint = match value {
      Operand::Literal(literal) => Some(literal),
      Operand::List(items) => items.first(),
      Operand::Property(_) => None,
    };
    let column = self.column(name, hint)?;

    let literal = match value {
      Operand::Property(other) => {
        return Err(Error::CompilerSyntax(format!(
          "cannot compare property `{}` with property `{}`",
          name, other
        )))
      }
      Operand::List(items) => {
        let negated = match op {
          CompareOp::In => negated,
          CompareOp::NotIn => !negated,
          _ => {
            return Err(Error::CompilerSyntax(format!(
              "a list can only follow `in`, not `{}`",
              op
            )))
          }
        };
        if items.is_empty() {
          return Err(Error::CompilerSyntax(format!("`{}` is tested against an empty list", name)));
        }
        let leaves = items
          .iter()
          .map(|item| {
            let value = self.value(column, item)?;
            self.leaf(column, Condition::Equals(value), negated)
          })
          .collect::<Result<Vec<_>>>()?;
        return Ok(combine(negated, leaves));
      }
      Operand::Literal(literal) => literal,
    };

    let condition = match (op, literal) {
      (CompareOp::Eq | CompareOp::NotEq, Literal::None) => {
        return Err(Error::CompilerSyntax(format!(
          "`{} {} None` compares with null; use `is None` or `is not None`",
          name, op
        )))
      }
      (CompareOp::Is, Literal::None) => Condition::IsEmpty,
      (CompareOp::IsNot, Literal::None) => Condition::IsNotEmpty,
      (CompareOp::In | CompareOp::NotIn, _) => {
        return Err(Error::CompilerSyntax(format!(
          "`{} {}` needs a list, e.g. `{} in [\"a\", \"b\"]`",
          name, op, name
        )))
      }
      (op, literal) => {
        let value = self.value(column, literal)?;
        let dated = column.family() == Family::Date;
        match op {
          CompareOp::Eq | CompareOp::Is => Condition::Equals(value),
          CompareOp::NotEq | CompareOp::IsNot => Condition::DoesNotEqual(value),
          CompareOp::Lt if dated => Condition::Before(value),
          CompareOp::Gt if dated => Condition::After(value),
          CompareOp::Le if dated => Condition::OnOrBefore(value),
          CompareOp::Ge if dated => Condition::OnOrAfter(value),
          CompareOp::Lt => Condition::LessThan(value),
          CompareOp::Gt => Condition::GreaterThan(value),
          CompareOp::Le => Condition::LessThanOrEqualTo(value),
          CompareOp::Ge => Condition::GreaterThanOrEqualTo(value),
          CompareOp::In | CompareOp::NotIn => unreachable!("membership handled above"),
        }
      }
    };

    self.leaf(column, condition, negated)
  }

  fn leaf(&self, column: Column<'_>, condition: Condition, negated: bool) -> Result<FilterNode> {
    let condition = if negated { condition.negate() } else { condition };
    if !supports(column.family(), &condition) {
      return Err(Error::CompilerSyntax(format!(
        "`{}` ({}) does not support `{}`",
        column.name,
        column.kind,
        condition.operator()
      )));
    }
    Ok(match column.formula {
      Some(result) => FilterNode::formula_leaf(column.name, result, condition),
      None => FilterNode::leaf(column.name, column.kind, condition),
    })
  }

  /// Resolves `name`. A formula column without a declared result type takes
  /// it from the literal it is compared with.
  fn column<'n>(&self, name: &'n str, hint: Option<&Literal>) -> Result<Column<'n>> {
    let def = self
      .schema
      .get(name)
      .ok_or_else(|| Error::CompilerName(format!("`{}` is not a property of this database", name)))?;
    let formula = match def.kind {
      PropertyType::Formula => def.formula.or_else(|| match hint {
        Some(Literal::Int(_) | Literal::Float(_)) => Some(FormulaType::Number),
        Some(Literal::Bool(_)) => Some(FormulaType::Boolean),
        Some(Literal::Str(_)) => Some(FormulaType::String),
        _ => None,
      }),
      _ => None,
    };
    Ok(Column {
      name,
      kind: def.kind,
      formula,
    })
  }

  /// Type-checks a literal against the property and converts it to JSON.
  fn value(&self, column: Column<'_>, literal: &Literal) -> Result<Value> {
    let value = match (column.family(), literal) {
      (_, Literal::None) => None,
      (Family::Number, Literal::Int(n)) => Some(json!(n)),
      (Family::Number, Literal::Float(n)) => Some(json!(n)),
      (Family::Checkbox, Literal::Bool(b)) => Some(json!(b)),
      (Family::Date, Literal::Str(s)) if is_iso_date(s) => Some(json!(s)),
      (Family::Date, _) => None,
      (
        Family::Text | Family::Select | Family::MultiSelect | Family::Person | Family::Relation,
        Literal::Str(s),
      ) => Some(json!(s)),
      _ => None,
    };

    value.ok_or_else(|| {
      let expected = match column.family() {
        Family::Number => "a number",
        Family::Checkbox => "True or False",
        Family::Date => "an ISO 8601 date string",
        Family::Files | Family::Computed => "no value",
        _ => "a string",
      };
      Error::CompilerSyntax(format!(
        "`{}` ({}) expects {}, got {}",
        column.name, column.kind, expected, literal
      ))
    })
  }
}

/// Operators the query endpoint accepts for each family.
fn supports(family: Family, condition: &Condition) -> bool {
  use Condition::*;

  match family {
    Family::Text => matches!(
      condition,
      Equals(_) | DoesNotEqual(_) | Contains(_) | DoesNotContain(_) | IsEmpty | IsNotEmpty
    ),
    Family::Number => matches!(
      condition,
      Equals(_)
        | DoesNotEqual(_)
        | GreaterThan(_)
        | LessThan(_)
        | GreaterThanOrEqualTo(_)
        | LessThanOrEqualTo(_)
        | IsEmpty
        | IsNotEmpty
    ),
    Family::Checkbox => matches!(condition, Equals(_) | DoesNotEqual(_)),
    Family::Select => matches!(condition, Equals(_) | DoesNotEqual(_) | IsEmpty | IsNotEmpty),
    Family::MultiSelect | Family::Person | Family::Relation => {
      matches!(condition, Contains(_) | DoesNotContain(_) | IsEmpty | IsNotEmpty)
    }
    Family::Date => matches!(
      condition,
      Equals(_) | Before(_) | After(_) | OnOrBefore(_) | OnOrAfter(_) | IsEmpty | IsNotEmpty
    ),
    Family::Files => matches!(condition, IsEmpty | IsNotEmpty),
    Family::Computed => false,
  }
}

/// Builds an `and` (or `or`) node, splicing in children of the same kind.
fn combine(conjunction: bool, children: Vec<FilterNode>) -> FilterNode {
  let mut flat = Vec::with_capacity(children.len());
  for child in children {
    match child {
      FilterNode::And(inner) if conjunction && !inner.is_empty() => flat.extend(inner),
      FilterNode::Or(inner) if !conjunction && !inner.is_empty() => flat.extend(inner),
      other => flat.push(other),
    }
  }

  if flat.len() == 1 {
    return flat.remove(0);
  }
  if conjunction {
    FilterNode::And(flat)
  } else {
    FilterNode::Or(flat)
  }
}
