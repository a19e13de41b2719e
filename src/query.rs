// Parameterized search queries, compiled once and rendered per call.

use serde_json::{json, Value};

use crate::error::{Error, Result};

/// A compiled "terms" filter matching one field against a bound list of
/// values.
///
/// Compilation builds the query skeleton once; `render` only clones it and
/// binds the value list, so the per-call cost stays constant no matter how
/// often the query runs.
#[derive(Debug, Clone)]
pub struct TermsQuery {
    field: String,
    skeleton: Value,
}

impl TermsQuery {
    pub fn compile(field: &str) -> Result<Self> {
        if field.is_empty() || field.contains(|c: char| c == '"' || c.is_whitespace()) {
            return Err(Error::Template(format!("invalid field name {field:?}")));
        }
        let skeleton = json!({
            "query": {
                "terms": {
                    (field): []
                }
            }
        });
        Ok(Self {
            field: field.to_string(),
            skeleton,
        })
    }

    /// Bind the given values into a fresh copy of the compiled skeleton.
    #[must_use]
    pub fn render(&self, values: &[String]) -> Value {
        let mut query = self.skeleton.clone();
        query["query"]["terms"][&self.field] = json!(values);
        query
    }

    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_and_render() {
        let tmpl = TermsQuery::compile("_id").unwrap();
        assert_eq!(tmpl.field(), "_id");

        let query = tmpl.render(&["policyA".to_string(), "policyB".to_string()]);
        assert_eq!(query["query"]["terms"]["_id"], json!(["policyA", "policyB"]));
    }

    #[test]
    fn test_render_is_repeatable() {
        let tmpl = TermsQuery::compile("_id").unwrap();
        let first = tmpl.render(&["a".to_string()]);
        let second = tmpl.render(&["b".to_string()]);

        assert_eq!(first["query"]["terms"]["_id"], json!(["a"]));
        assert_eq!(second["query"]["terms"]["_id"], json!(["b"]));
    }

    #[test]
    fn test_rejects_bad_field() {
        assert!(TermsQuery::compile("").is_err());
        assert!(TermsQuery::compile("bad field").is_err());
    }
}
