use serde_json::Value;

/// Row predicate understood by every backend
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Field equals value (compared by text representation)
    Eq(String, Value),
    /// Case-insensitive substring match; the needle is matched literally
    Contains(String, String),
    /// Logical OR; an empty list matches nothing
    Any(Vec<Filter>),
    /// Logical AND; an empty list matches everything
    All(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(field.to_string(), value.into())
    }

    pub fn contains(field: &str, needle: &str) -> Self {
        Filter::Contains(field.to_string(), needle.to_string())
    }

    /// Every field name referenced by this filter
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Filter::Eq(field, _) | Filter::Contains(field, _) => vec![field.as_str()],
            Filter::Any(filters) | Filter::All(filters) => {
                filters.iter().flat_map(|f| f.fields()).collect()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

/// Select parameters: filter, ordering, and paging
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectQuery {
    pub filter: Option<Filter>,
    pub order: Option<OrderBy>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl SelectQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn order_by(mut self, field: &str, direction: SortDirection) -> Self {
        self.order = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Escape LIKE metacharacters so user input matches literally (escape char is `\`)
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Text form of a JSON value used for equality and substring matching
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("vis"), "vis");
        assert_eq!(escape_like("50%"), "50\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("c:\\d"), "c:\\\\d");
    }

    #[test]
    fn test_filter_fields() {
        let filter = Filter::All(vec![
            Filter::eq("subcategory_id", "abc"),
            Filter::Any(vec![
                Filter::contains("name", "vis"),
                Filter::contains("code", "vis"),
            ]),
        ]);
        assert_eq!(filter.fields(), vec!["subcategory_id", "name", "code"]);
    }

    #[test]
    fn test_value_text() {
        assert_eq!(value_text(&json!("x")), Some("x".to_string()));
        assert_eq!(value_text(&json!(true)), Some("true".to_string()));
        assert_eq!(value_text(&json!(12)), Some("12".to_string()));
        assert_eq!(value_text(&Value::Null), None);
    }
}
