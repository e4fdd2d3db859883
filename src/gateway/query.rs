//! Row selection and filtering, modelled after PostgREST's query grammar.

use serde_json::Value;

#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    In(String, Vec<Value>),
}

impl Filter {
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(column.to_string(), value.into())
    }

    pub fn is_in<V: Into<Value>>(column: &str, values: impl IntoIterator<Item = V>) -> Self {
        Filter::In(column.to_string(), values.into_iter().map(Into::into).collect())
    }

    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(column, _) | Filter::In(column, _) => column,
        }
    }

    /// Checks a row against the filter. Numbers and strings holding the same
    /// text compare equal, like PostgREST casting the query string.
    pub fn matches(&self, row: &Value) -> bool {
        let Some(cell) = row.get(self.column()) else {
            return false;
        };
        match self {
            Filter::Eq(_, value) => loosely_equal(cell, value),
            Filter::In(_, values) => values.iter().any(|v| loosely_equal(cell, v)),
        }
    }

    /// Encodes the filter as a `column=op.value` query pair.
    pub fn to_query_pair(&self) -> (String, String) {
        match self {
            Filter::Eq(column, value) => (column.clone(), format!("eq.{}", render_value(value))),
            Filter::In(column, values) => {
                let list = values
                    .iter()
                    .map(render_list_item)
                    .collect::<Vec<_>>()
                    .join(",");
                (column.clone(), format!("in.({})", list))
            }
        }
    }
}

fn loosely_equal(a: &Value, b: &Value) -> bool {
    if a == b {
        return true;
    }
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            render_value(a) == render_value(b)
        }
        _ => false,
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn render_list_item(value: &Value) -> String {
    let raw = render_value(value);
    if raw.contains([',', '(', ')', '"']) {
        format!("\"{}\"", raw.replace('"', "\\\""))
    } else {
        raw
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    pub table: String,
    pub columns: String,
    pub filters: Vec<Filter>,
    pub order: Option<Order>,
}

impl Query {
    pub fn table(name: &str) -> Self {
        Self {
            table: name.to_string(),
            columns: "*".to_string(),
            filters: vec![],
            order: None,
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.columns = columns.to_string();
        self
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::eq(column, value));
        self
    }

    pub fn is_in<V: Into<Value>>(mut self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.filters.push(Filter::is_in(column, values));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        self.order = Some(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    /// Column names requested by the projection, `None` for `*`.
    pub fn projected_columns(&self) -> Option<Vec<&str>> {
        if self.columns.trim() == "*" {
            return None;
        }
        Some(
            self.columns
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .collect(),
        )
    }

    /// Query pairs in the order PostgREST expects them.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![("select".to_string(), self.columns.replace(' ', ""))];
        pairs.extend(self.filters.iter().map(Filter::to_query_pair));
        if let Some(order) = &self.order {
            let direction = if order.ascending { "asc" } else { "desc" };
            pairs.push(("order".to_string(), format!("{}.{}", order.column, direction)));
        }
        pairs
    }
}
