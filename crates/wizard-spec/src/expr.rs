use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::empty::is_empty_value;
use crate::path::Path;

/// Lightweight expression AST used for `hidden` predicates and array filters.
///
/// Paths are resolved against the current item: the document root for
/// top-level nodes, the array element for nodes nested in an array input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Expr {
    LiteralBool {
        value: bool,
    },
    Truthy {
        #[schemars(with = "String")]
        path: Path,
    },
    Falsy {
        #[schemars(with = "String")]
        path: Path,
    },
    Empty {
        #[schemars(with = "String")]
        path: Path,
    },
    Eq {
        #[schemars(with = "String")]
        path: Path,
        value: Value,
    },
    Ne {
        #[schemars(with = "String")]
        path: Path,
        value: Value,
    },
    In {
        #[schemars(with = "String")]
        path: Path,
        values: Vec<Value>,
    },
    And {
        expressions: Vec<Expr>,
    },
    Or {
        expressions: Vec<Expr>,
    },
    Not {
        expression: Box<Expr>,
    },
}

impl Expr {
    pub fn truthy(path: Path) -> Self {
        Expr::Truthy { path }
    }

    pub fn falsy(path: Path) -> Self {
        Expr::Falsy { path }
    }

    pub fn equals(path: Path, value: impl Into<Value>) -> Self {
        Expr::Eq {
            path,
            value: value.into(),
        }
    }

    pub fn not_equals(path: Path, value: impl Into<Value>) -> Self {
        Expr::Ne {
            path,
            value: value.into(),
        }
    }

    /// Evaluates the expression against the current item.
    pub fn evaluate(&self, item: &Value) -> bool {
        match self {
            Expr::LiteralBool { value } => *value,
            Expr::Truthy { path } => path.get(item).is_some_and(is_truthy),
            Expr::Falsy { path } => !path.get(item).is_some_and(is_truthy),
            Expr::Empty { path } => path.get(item).is_none_or(is_empty_value),
            Expr::Eq { path, value } => path.get(item) == Some(value),
            Expr::Ne { path, value } => path.get(item) != Some(value),
            Expr::In { path, values } => path
                .get(item)
                .is_some_and(|current| values.contains(current)),
            Expr::And { expressions } => expressions.iter().all(|expr| expr.evaluate(item)),
            Expr::Or { expressions } => expressions.iter().any(|expr| expr.evaluate(item)),
            Expr::Not { expression } => !expression.evaluate(item),
        }
    }
}

/// JavaScript truthiness: null, false, 0, NaN and "" are falsy, containers are truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(input: &str) -> Path {
        Path::parse(input).unwrap()
    }

    #[test]
    fn truthy_follows_javascript_rules() {
        let item = json!({
            "spec": { "automationDef": { "name": "", "secret": "creds", "count": 0, "vars": {} } }
        });
        assert!(!Expr::truthy(path("spec.automationDef.name")).evaluate(&item));
        assert!(Expr::truthy(path("spec.automationDef.secret")).evaluate(&item));
        assert!(!Expr::truthy(path("spec.automationDef.count")).evaluate(&item));
        assert!(Expr::truthy(path("spec.automationDef.vars")).evaluate(&item));
        assert!(Expr::falsy(path("spec.missing.deeper")).evaluate(&item));
    }

    #[test]
    fn comparison_against_missing_path() {
        let item = json!({ "spec": { "mode": "disabled" } });
        assert!(Expr::equals(path("spec.mode"), "disabled").evaluate(&item));
        assert!(Expr::not_equals(path("spec.delay"), 0).evaluate(&item));
        assert!(!Expr::equals(path("spec.delay"), Value::Null).evaluate(&item));
    }

    #[test]
    fn deserializes_tagged_form() {
        let expr: Expr = serde_json::from_value(json!({
            "op": "not",
            "expression": { "op": "truthy", "path": "spec.automationDef.secret" }
        }))
        .unwrap();
        assert!(expr.evaluate(&json!({})));
        assert!(!expr.evaluate(&json!({ "spec": { "automationDef": { "secret": "x" } } })));
    }

    #[test]
    fn combinators_short_circuit_semantics() {
        let item = json!({ "kind": "Subscription" });
        let expr = Expr::And {
            expressions: vec![
                Expr::In {
                    path: path("kind"),
                    values: vec![json!("Channel"), json!("Subscription")],
                },
                Expr::Or {
                    expressions: vec![
                        Expr::LiteralBool { value: false },
                        Expr::Empty { path: path("name") },
                    ],
                },
            ],
        };
        assert!(expr.evaluate(&item));
    }
}
