use serde_json::{Map, Value};

/// Numeric comparison applied to a document field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    /// Mongo-style query operator
    pub fn operator(&self) -> &'static str {
        match self {
            Comparison::Eq => "$eq",
            Comparison::Gt => "$gt",
            Comparison::Gte => "$gte",
            Comparison::Lt => "$lt",
            Comparison::Lte => "$lte",
        }
    }

    pub fn sql_operator(&self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
        }
    }

    pub fn holds(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::Eq => lhs == rhs,
            Comparison::Gt => lhs > rhs,
            Comparison::Gte => lhs >= rhs,
            Comparison::Lt => lhs < rhs,
            Comparison::Lte => lhs <= rhs,
        }
    }
}

/// One `field <op> value` clause
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub comparison: Comparison,
    pub value: f64,
}

/// Conjunction of numeric field conditions. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: impl Into<String>, comparison: Comparison, value: f64) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            comparison,
            value,
        });
        self
    }

    pub fn gte(self, field: impl Into<String>, value: f64) -> Self {
        self.with(field, Comparison::Gte, value)
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Evaluate against a document. Missing or non-numeric fields never match.
    pub fn matches(&self, document: &Value) -> bool {
        self.conditions.iter().all(|c| {
            document
                .get(&c.field)
                .and_then(Value::as_f64)
                .map(|v| c.comparison.holds(v, c.value))
                .unwrap_or(false)
        })
    }

    /// Render as a Mongo-style filter document, e.g. `{"ethylene": {"$gte": 0.5}}`
    pub fn to_document(&self) -> Value {
        let mut document = Map::new();
        for condition in &self.conditions {
            let entry = document
                .entry(condition.field.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(ops) = entry {
                ops.insert(
                    condition.comparison.operator().to_string(),
                    Value::from(condition.value),
                );
            }
        }
        Value::Object(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_gte_matches_boundary() {
        let filter = Filter::new().gte("ethylene", 0.5);

        assert!(filter.matches(&json!({"ethylene": 0.5})));
        assert!(filter.matches(&json!({"ethylene": 3})));
        assert!(!filter.matches(&json!({"ethylene": 0.49})));
    }

    #[test]
    fn test_missing_or_text_field_never_matches() {
        let filter = Filter::new().gte("ethylene", 0.0);

        assert!(!filter.matches(&json!({"humidity": 40.0})));
        assert!(!filter.matches(&json!({"ethylene": "high"})));
    }

    #[test]
    fn test_conditions_are_conjunctive() {
        let filter = Filter::new()
            .gte("ethylene", 0.5)
            .with("ethylene", Comparison::Lt, 1.0);

        assert!(filter.matches(&json!({"ethylene": 0.7})));
        assert!(!filter.matches(&json!({"ethylene": 1.2})));
        assert!(Filter::new().matches(&json!({})));
    }

    #[test]
    fn test_to_document() {
        let filter = Filter::new()
            .gte("ethylene", 0.5)
            .with("ethylene", Comparison::Lte, 2.0);

        assert_eq!(
            filter.to_document(),
            json!({"ethylene": {"$gte": 0.5, "$lte": 2.0}})
        );
    }
}
