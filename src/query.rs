//! Filter trees, sorts and query payloads for database queries.
//!
//! A compiled expression becomes a [`FilterNode`] tree: leaves carry a property,
//! its type and one [`Condition`]; combinators hold ordered children. The tree
//! serializes to the `filter` object of a query request:
//!
//! ```text
//! leaf:       {"property": "Number", "number": {"equals": 2}}
//! combinator: {"and": [<leaf or combinator>, ...]}
//! ```

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::fmt;

use crate::compile;
use crate::database::Database;
use crate::error::{Error, Result};
use crate::pagination::QueriedPages;
use crate::property::{FormulaType, PropertyType};
use crate::protocol::MAX_PAGE_SIZE;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Ascending => write!(f, "ascending"),
            SortDirection::Descending => write!(f, "descending"),
        }
    }
}

/// Page timestamps that can be sorted on without naming a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Timestamp {
    CreatedTime,
    LastEditedTime,
}

/// Sort specification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sort {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
    pub direction: SortDirection,
}

impl Sort {
    pub fn property(name: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            property: Some(name.into()),
            timestamp: None,
            direction,
        }
    }

    pub fn timestamp(timestamp: Timestamp, direction: SortDirection) -> Self {
        Self {
            property: None,
            timestamp: Some(timestamp),
            direction,
        }
    }
}

/// Condition of a filter leaf
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals(Value),
    DoesNotEqual(Value),
    Contains(Value),
    DoesNotContain(Value),
    GreaterThan(Value),
    LessThan(Value),
    GreaterThanOrEqualTo(Value),
    LessThanOrEqualTo(Value),
    Before(Value),
    After(Value),
    OnOrBefore(Value),
    OnOrAfter(Value),
    IsEmpty,
    IsNotEmpty,
}

impl Condition {
    pub fn operator(&self) -> &'static str {
        match self {
            Condition::Equals(_) => "equals",
            Condition::DoesNotEqual(_) => "does_not_equal",
            Condition::Contains(_) => "contains",
            Condition::DoesNotContain(_) => "does_not_contain",
            Condition::GreaterThan(_) => "greater_than",
            Condition::LessThan(_) => "less_than",
            Condition::GreaterThanOrEqualTo(_) => "greater_than_or_equal_to",
            Condition::LessThanOrEqualTo(_) => "less_than_or_equal_to",
            Condition::Before(_) => "before",
            Condition::After(_) => "after",
            Condition::OnOrBefore(_) => "on_or_before",
            Condition::OnOrAfter(_) => "on_or_after",
            Condition::IsEmpty => "is_empty",
            Condition::IsNotEmpty => "is_not_empty",
        }
    }

    /// Value sent under the operator key. Emptiness checks send `true`.
    pub fn operand(&self) -> Value {
        match self {
            Condition::Equals(v)
            | Condition::DoesNotEqual(v)
            | Condition::Contains(v)
            | Condition::DoesNotContain(v)
            | Condition::GreaterThan(v)
            | Condition::LessThan(v)
            | Condition::GreaterThanOrEqualTo(v)
            | Condition::LessThanOrEqualTo(v)
            | Condition::Before(v)
            | Condition::After(v)
            | Condition::OnOrBefore(v)
            | Condition::OnOrAfter(v) => v.clone(),
            Condition::IsEmpty | Condition::IsNotEmpty => Value::Bool(true),
        }
    }

    /// Complementary condition. Whether the property type supports it is
    /// checked by the compiler.
    pub fn negate(&self) -> Condition {
        match self.clone() {
            Condition::Equals(v) => Condition::DoesNotEqual(v),
            Condition::DoesNotEqual(v) => Condition::Equals(v),
            Condition::Contains(v) => Condition::DoesNotContain(v),
            Condition::DoesNotContain(v) => Condition::Contains(v),
            Condition::GreaterThan(v) => Condition::LessThanOrEqualTo(v),
            Condition::LessThanOrEqualTo(v) => Condition::GreaterThan(v),
            Condition::LessThan(v) => Condition::GreaterThanOrEqualTo(v),
            Condition::GreaterThanOrEqualTo(v) => Condition::LessThan(v),
            Condition::Before(v) => Condition::OnOrAfter(v),
            Condition::OnOrAfter(v) => Condition::Before(v),
            Condition::After(v) => Condition::OnOrBefore(v),
            Condition::OnOrBefore(v) => Condition::After(v),
            Condition::IsEmpty => Condition::IsNotEmpty,
            Condition::IsNotEmpty => Condition::IsEmpty,
        }
    }
}

/// Condition on a single property
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    pub property: String,
    pub kind: PropertyType,
    /// Set for formula columns; the condition is nested under this key
    pub formula: Option<FormulaType>,
    pub condition: Condition,
}

/// Node of a compiled filter tree
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    Leaf(Leaf),
    And(Vec<FilterNode>),
    Or(Vec<FilterNode>),
}

impl FilterNode {
    pub fn leaf(property: impl Into<String>, kind: PropertyType, condition: Condition) -> Self {
        FilterNode::Leaf(Leaf {
            property: property.into(),
            kind,
            formula: None,
            condition,
        })
    }

    /// Condition on the result of a formula column.
    pub fn formula_leaf(property: impl Into<String>, result: FormulaType, condition: Condition) -> Self {
        FilterNode::Leaf(Leaf {
            property: property.into(),
            kind: PropertyType::Formula,
            formula: Some(result),
            condition,
        })
    }

    /// The filter that matches everything: an `or` with no children.
    pub fn empty() -> Self {
        FilterNode::Or(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, FilterNode::Or(children) if children.is_empty())
    }

    /// Combines with AND, appending to an existing AND node.
    pub fn and(self, other: FilterNode) -> Self {
        match self {
            FilterNode::And(mut list) => {
                list.push(other);
                FilterNode::And(list)
            }
            _ => FilterNode::And(vec![self, other]),
        }
    }

    /// Combines with OR, appending to an existing OR node.
    pub fn or(self, other: FilterNode) -> Self {
        match self {
            FilterNode::Or(mut list) => {
                list.push(other);
                FilterNode::Or(list)
            }
            _ => FilterNode::Or(vec![self, other]),
        }
    }

    /// Longest path from this node to a leaf, counting combinators.
    pub fn depth(&self) -> usize {
        match self {
            FilterNode::Leaf(_) => 0,
            FilterNode::And(children) | FilterNode::Or(children) => {
                1 + children.iter().map(FilterNode::depth).max().unwrap_or(0)
            }
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            FilterNode::Leaf(leaf) => {
                let mut condition = Map::new();
                condition.insert(leaf.condition.operator().to_string(), leaf.condition.operand());
                let mut condition = Value::Object(condition);
                if let Some(result) = leaf.formula {
                    condition = json!({ result.filter_key(): condition });
                }
                let mut node = Map::new();
                node.insert("property".to_string(), json!(leaf.property));
                node.insert(leaf.kind.as_str().to_string(), condition);
                Value::Object(node)
            }
            FilterNode::And(children) => {
                json!({ "and": children.iter().map(FilterNode::to_json).collect::<Vec<_>>() })
            }
            FilterNode::Or(children) => {
                json!({ "or": children.iter().map(FilterNode::to_json).collect::<Vec<_>>() })
            }
        }
    }
}

impl Serialize for FilterNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Body of `POST v1/databases/{id}/query`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryPayload {
    pub filter: FilterNode,
    pub sorts: Vec<Sort>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_cursor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

impl Default for QueryPayload {
    fn default() -> Self {
        Self {
            filter: FilterNode::empty(),
            sorts: Vec::new(),
            start_cursor: None,
            page_size: None,
        }
    }
}

/// Query builder for a database
///
/// # Example
/// ```no_run
/// use notionizer::{Notion, RemoteObject, SortDirection};
///
/// # fn main() -> notionizer::Result<()> {
/// let notion = Notion::new("secret_token")?;
/// let db = notion.get_database("44d6b8fda2734f04968a771a79f97fb6")?;
/// let pages = db
///     .query_builder()
///     .filter("Number > 2 and not Checkbox")
///     .sort("Number", SortDirection::Descending)
///     .page_size(50)
///     .run()?;
/// for page in pages {
///     println!("{}", page?.id());
/// }
/// # Ok(())
/// # }
/// ```
pub struct QueryBuilder<'a> {
    database: &'a Database,
    expression: Option<String>,
    sorts: Vec<Sort>,
    page_size: Option<u32>,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(database: &'a Database) -> Self {
        Self {
            database,
            expression: None,
            sorts: Vec::new(),
            page_size: None,
        }
    }

    /// Filter expression, compiled against the database schema on build
    pub fn filter(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    /// Sort by property
    pub fn sort(mut self, property: impl Into<String>, direction: SortDirection) -> Self {
        self.sorts.push(Sort::property(property, direction));
        self
    }

    /// Sort by page timestamp
    pub fn sort_by_timestamp(mut self, timestamp: Timestamp, direction: SortDirection) -> Self {
        self.sorts.push(Sort::timestamp(timestamp, direction));
        self
    }

    /// Results per request, at most 100
    pub fn page_size(mut self, n: u32) -> Self {
        self.page_size = Some(n);
        self
    }

    /// Compiles the filter and checks sorts and page size.
    pub fn build(&self) -> Result<QueryPayload> {
        let schema = self.database.schema()?;

        let filter = match self.expression.as_deref() {
            Some(expression) => compile::compile(&schema, expression)?,
            None => FilterNode::empty(),
        };

        for sort in &self.sorts {
            if let Some(name) = &sort.property {
                if schema.get(name).is_none() {
                    return Err(Error::CompilerName(format!(
                        "cannot sort on `{}`: not a property of this database",
                        name
                    )));
                }
            }
        }

        if let Some(size) = self.page_size {
            if size == 0 || size > MAX_PAGE_SIZE {
                return Err(Error::Validation(format!(
                    "page size must be between 1 and {}, got {}",
                    MAX_PAGE_SIZE, size
                )));
            }
        }

        Ok(QueryPayload {
            filter,
            sorts: self.sorts.clone(),
            start_cursor: None,
            page_size: self.page_size,
        })
    }

    /// Builds the payload and issues the first request.
    pub fn run(self) -> Result<QueriedPages> {
        let payload = self.build()?;
        QueriedPages::new(self.database.client().clone(), self.database.query_path(), payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn number_eq(n: i64) -> FilterNode {
        FilterNode::leaf("Number", PropertyType::Number, Condition::Equals(json!(n)))
    }

    #[test]
    fn test_empty_filter() {
        let filter = FilterNode::empty();
        assert!(filter.is_empty());
        assert_eq!(filter.to_json(), json!({"or": []}));
    }

    #[test]
    fn test_leaf_json() {
        assert_eq!(
            number_eq(2).to_json(),
            json!({"property": "Number", "number": {"equals": 2}})
        );
        let empty = FilterNode::leaf("Title", PropertyType::Title, Condition::IsEmpty);
        assert_eq!(empty.to_json(), json!({"property": "Title", "title": {"is_empty": true}}));
        let total = FilterNode::formula_leaf("Total", FormulaType::Number, Condition::GreaterThan(json!(1)));
        assert_eq!(
            total.to_json(),
            json!({"property": "Total", "formula": {"number": {"greater_than": 1}}})
        );
    }

    #[test]
    fn test_combinators_flatten() {
        let filter = number_eq(1).and(number_eq(2)).and(number_eq(3));
        match &filter {
            FilterNode::And(children) => assert_eq!(children.len(), 3),
            other => panic!("Expected And, got {:?}", other),
        }
        assert_eq!(filter.depth(), 1);
        assert_eq!(number_eq(1).or(filter).depth(), 2);
    }

    #[test]
    fn test_negation_pairs() {
        let c = Condition::Before(json!("2022-03-25"));
        assert_eq!(c.negate(), Condition::OnOrAfter(json!("2022-03-25")));
        assert_eq!(c.negate().negate(), c);
        assert_eq!(Condition::IsEmpty.negate(), Condition::IsNotEmpty);
    }

    #[test]
    fn test_payload_serialization() {
        let payload = QueryPayload {
            filter: number_eq(2),
            sorts: vec![
                Sort::property("Number", SortDirection::Descending),
                Sort::timestamp(Timestamp::CreatedTime, SortDirection::Ascending),
            ],
            start_cursor: None,
            page_size: Some(10),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["filter"]["number"]["equals"], json!(2));
        assert_eq!(value["sorts"][0], json!({"property": "Number", "direction": "descending"}));
        assert_eq!(value["sorts"][1], json!({"timestamp": "created_time", "direction": "ascending"}));
        assert_eq!(value["page_size"], json!(10));
        assert!(value.get("start_cursor").is_none());
    }
}
