//! Assertion specs and their evaluation results.
//!
//! A spec is a typed check, not a free-form configuration bag: the wire
//! `type` discriminates the enum and `configuration` carries the per-type
//! fields. Wire names match the project files users already have
//! (`"Simple Contains"`, `"Response SLA"`, ...).

mod engine;
pub use engine::{evaluate, evaluate_with_context};

use serde::{Deserialize, Deserializer, Serialize};

/// One configured assertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionSpec {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub check: AssertionCheck,
}

/// The check itself, discriminated by the wire `type` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "configuration")]
pub enum AssertionCheck {
    #[serde(rename = "Simple Contains")]
    Contains(ContainsConfig),
    #[serde(rename = "Simple Not Contains")]
    NotContains(ContainsConfig),
    #[serde(rename = "Response SLA")]
    ResponseSla(SlaConfig),
    #[serde(rename = "XPath Match")]
    XPathMatch(XPathConfig),
    #[serde(rename = "SOAP Fault")]
    SoapFault(SoapFaultConfig),
    #[serde(rename = "HTTP Status")]
    HttpStatus(StatusConfig),
    #[serde(rename = "Script")]
    Script(ScriptConfig),
}

impl AssertionCheck {
    /// Wire name, as shown in result tables and lint messages.
    pub fn kind(&self) -> &'static str {
        match self {
            AssertionCheck::Contains(_) => "Simple Contains",
            AssertionCheck::NotContains(_) => "Simple Not Contains",
            AssertionCheck::ResponseSla(_) => "Response SLA",
            AssertionCheck::XPathMatch(_) => "XPath Match",
            AssertionCheck::SoapFault(_) => "SOAP Fault",
            AssertionCheck::HttpStatus(_) => "HTTP Status",
            AssertionCheck::Script(_) => "Script",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainsConfig {
    pub token: String,
    pub ignore_case: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SlaConfig {
    /// Maximum acceptable duration in milliseconds. Forms submit text, so
    /// both `"200"` and `200` deserialize.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_u64"
    )]
    pub sla: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct XPathConfig {
    pub xpath: String,
    pub expected_content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SoapFaultConfig {
    /// Whether a fault is the expected outcome.
    pub expect_fault: bool,
    /// When set, the fault's code text must contain this value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault_code: Option<String>,
}

impl Default for SoapFaultConfig {
    fn default() -> Self {
        SoapFaultConfig {
            expect_fault: true,
            fault_code: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusConfig {
    /// Comma list of exact codes (`200`), class digits (`2`) or `Nxx`
    /// forms (`2xx`).
    #[serde(deserialize_with = "lenient_string")]
    pub expected_status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScriptConfig {
    pub script: String,
}

/// Evaluation outcome for one spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AssertionStatus {
    Pass,
    Fail,
    Error,
}

/// One row of an assertion run, in spec order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssertionResult {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub status: AssertionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::Number(n)) => n.as_u64(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        Some(_) => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specs_deserialize_from_wire_shape() {
        let spec: AssertionSpec = serde_json::from_str(
            r#"{
                "id": "a-1",
                "name": "body mentions order",
                "type": "Simple Contains",
                "configuration": {"token": "Order", "ignoreCase": true}
            }"#,
        )
        .unwrap();
        match &spec.check {
            AssertionCheck::Contains(config) => {
                assert_eq!(config.token, "Order");
                assert!(config.ignore_case);
            }
            other => panic!("wrong variant: {other:?}"),
        }
        assert_eq!(spec.check.kind(), "Simple Contains");
    }

    #[test]
    fn sla_accepts_strings_and_numbers() {
        let from_text: AssertionSpec = serde_json::from_str(
            r#"{"id": "s", "type": "Response SLA", "configuration": {"sla": "250"}}"#,
        )
        .unwrap();
        let from_number: AssertionSpec = serde_json::from_str(
            r#"{"id": "s", "type": "Response SLA", "configuration": {"sla": 250}}"#,
        )
        .unwrap();
        for spec in [from_text, from_number] {
            match spec.check {
                AssertionCheck::ResponseSla(config) => assert_eq!(config.sla, Some(250)),
                other => panic!("wrong variant: {other:?}"),
            }
        }
    }

    #[test]
    fn unparseable_sla_becomes_none() {
        let spec: AssertionSpec = serde_json::from_str(
            r#"{"id": "s", "type": "Response SLA", "configuration": {"sla": "fast"}}"#,
        )
        .unwrap();
        match spec.check {
            AssertionCheck::ResponseSla(config) => assert_eq!(config.sla, None),
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn expected_status_accepts_bare_numbers() {
        let spec: AssertionSpec = serde_json::from_str(
            r#"{"id": "h", "type": "HTTP Status", "configuration": {"expectedStatus": 200}}"#,
        )
        .unwrap();
        match spec.check {
            AssertionCheck::HttpStatus(config) => assert_eq!(config.expected_status, "200"),
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn soap_fault_defaults_to_expecting_a_fault() {
        let spec: AssertionSpec = serde_json::from_str(
            r#"{"id": "f", "type": "SOAP Fault", "configuration": {}}"#,
        )
        .unwrap();
        match spec.check {
            AssertionCheck::SoapFault(config) => {
                assert!(config.expect_fault);
                assert_eq!(config.fault_code, None);
            }
            other => panic!("wrong variant: {other:?}"),
        }
    }

    #[test]
    fn unknown_types_are_rejected() {
        let result = serde_json::from_str::<AssertionSpec>(
            r#"{"id": "x", "type": "Regex Match", "configuration": {}}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn specs_round_trip() {
        let spec = AssertionSpec {
            id: "rt".to_string(),
            name: None,
            check: AssertionCheck::XPathMatch(XPathConfig {
                xpath: "//status".to_string(),
                expected_content: "success".to_string(),
            }),
        };
        let wire = serde_json::to_value(&spec).unwrap();
        assert_eq!(wire["type"], "XPath Match");
        assert_eq!(wire["configuration"]["xpath"], "//status");
        let back: AssertionSpec = serde_json::from_value(wire).unwrap();
        assert_eq!(back.id, "rt");
    }

    #[test]
    fn results_serialize_uppercase_status() {
        let result = AssertionResult {
            id: "r".to_string(),
            name: None,
            status: AssertionStatus::Fail,
            message: Some("Response does not contain 'x'".to_string()),
        };
        let wire = serde_json::to_value(&result).unwrap();
        assert_eq!(wire["status"], "FAIL");
    }
}
