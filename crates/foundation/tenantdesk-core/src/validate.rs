//! Declarative request validation.
//!
//! A [`RuleSet`] is built once per route and checked against the JSON body
//! (or a small object built from path params). Rules run in declaration
//! order and the first failure's message becomes the 422 reply message.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

#[derive(Debug, Clone)]
enum Check {
    Present,
    Email,
    ObjectId,
    Numeric,
    Boolean,
    Array { min: usize },
    OneOf(&'static [&'static str]),
}

#[derive(Debug, Clone)]
pub struct Rule {
    field: &'static str,
    check: Check,
    message: &'static str,
    optional: bool,
}

impl Rule {
    fn passes(&self, body: &Value) -> bool {
        let value = body.get(self.field);
        if is_empty(value) {
            return self.optional;
        }
        let Some(value) = value else {
            return self.optional;
        };
        match &self.check {
            Check::Present => true,
            Check::Email => value.as_str().is_some_and(is_email),
            Check::ObjectId => value.as_str().is_some_and(is_object_id),
            Check::Numeric => as_number(value).is_some(),
            Check::Boolean => as_bool(value).is_some(),
            Check::Array { min } => value.as_array().is_some_and(|a| a.len() >= *min),
            Check::OneOf(allowed) => value.as_str().is_some_and(|s| allowed.contains(&s)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(
        mut self,
        field: &'static str,
        check: Check,
        message: &'static str,
        optional: bool,
    ) -> Self {
        self.rules.push(Rule {
            field,
            check,
            message,
            optional,
        });
        self
    }

    pub fn required(self, field: &'static str, message: &'static str) -> Self {
        self.push(field, Check::Present, message, false)
    }

    pub fn email(self, field: &'static str, message: &'static str) -> Self {
        self.push(field, Check::Email, message, false)
    }

    pub fn object_id(self, field: &'static str, message: &'static str) -> Self {
        self.push(field, Check::ObjectId, message, false)
    }

    pub fn numeric(self, field: &'static str, message: &'static str) -> Self {
        self.push(field, Check::Numeric, message, false)
    }

    pub fn boolean(self, field: &'static str, message: &'static str) -> Self {
        self.push(field, Check::Boolean, message, false)
    }

    pub fn array(self, field: &'static str, min: usize, message: &'static str) -> Self {
        self.push(field, Check::Array { min }, message, false)
    }

    pub fn one_of(
        self,
        field: &'static str,
        allowed: &'static [&'static str],
        message: &'static str,
    ) -> Self {
        self.push(field, Check::OneOf(allowed), message, false)
    }

    pub fn optional_email(self, field: &'static str, message: &'static str) -> Self {
        self.push(field, Check::Email, message, true)
    }

    pub fn optional_object_id(self, field: &'static str, message: &'static str) -> Self {
        self.push(field, Check::ObjectId, message, true)
    }

    pub fn optional_numeric(self, field: &'static str, message: &'static str) -> Self {
        self.push(field, Check::Numeric, message, true)
    }

    /// Message of the first failing rule, if any.
    pub fn check(&self, body: &Value) -> Result<(), &'static str> {
        match self.rules.iter().find(|r| !r.passes(body)) {
            Some(rule) => Err(rule.message),
            None => Ok(()),
        }
    }
}

fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(_) => false,
    }
}

fn email_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$").ok()
    })
    .as_ref()
}

pub fn is_email(s: &str) -> bool {
    email_regex().is_some_and(|re| re.is_match(s.trim()))
}

pub fn is_object_id(s: &str) -> bool {
    bson::oid::ObjectId::parse_str(s).is_ok()
}

/// Numbers arrive either as JSON numbers or numeric strings.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

pub fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lead_rules() -> RuleSet {
        RuleSet::new()
            .email("business_email", "Email is required and must be valid")
            .required("company_name", "Company Name is required")
            .object_id("plan", "Plan is required")
    }

    #[test]
    fn first_failure_is_reported() {
        let rules = lead_rules();
        assert_eq!(rules.check(&json!({})), Err("Email is required and must be valid"));
        assert_eq!(
            rules.check(&json!({"business_email": "a@b.io", "company_name": "  "})),
            Err("Company Name is required")
        );
        assert_eq!(
            rules.check(&json!({
                "business_email": "a@b.io",
                "company_name": "Acme",
                "plan": "nope",
            })),
            Err("Plan is required")
        );
        assert!(rules
            .check(&json!({
                "business_email": "a@b.io",
                "company_name": "Acme",
                "plan": "65a1b2c3d4e5f60718293a4b"
            }))
            .is_ok());
    }

    #[test]
    fn numeric_accepts_strings() {
        let rules = RuleSet::new().numeric("price", "Price is required");
        assert!(rules.check(&json!({"price": "12.5"})).is_ok());
        assert!(rules.check(&json!({"price": 3})).is_ok());
        assert!(rules.check(&json!({"price": "twelve"})).is_err());
    }

    #[test]
    fn optional_rules_skip_absent_fields() {
        let rules = RuleSet::new().optional_object_id("_id", "Invalid id");
        assert!(rules.check(&json!({})).is_ok());
        assert!(rules.check(&json!({"_id": ""})).is_ok());
        assert_eq!(rules.check(&json!({"_id": "123"})), Err("Invalid id"));
    }

    #[test]
    fn array_minimum() {
        let rules = RuleSet::new().array("ids", 1, "Ids are required");
        assert!(rules.check(&json!({"ids": []})).is_err());
        assert!(rules.check(&json!({"ids": ["x"]})).is_ok());
        assert!(rules.check(&json!({"ids": "x"})).is_err());
    }

    #[test]
    fn one_of_and_boolean() {
        let rules = RuleSet::new()
            .one_of("collection", &["role", "user"], "Invalid collection")
            .boolean("workstatus", "Work status is required");
        assert_eq!(
            rules.check(&json!({"collection": "lead", "workstatus": true})),
            Err("Invalid collection")
        );
        assert!(rules.check(&json!({"collection": "user", "workstatus": "false"})).is_ok());
    }

    #[test]
    fn email_shapes() {
        assert!(is_email("first.last+tag@example.co.uk"));
        assert!(!is_email("no-at-sign"));
        assert!(!is_email("x@localhost"));
    }
}
