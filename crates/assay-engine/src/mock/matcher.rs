//! First-match rule dispatch.

use regex::Regex;
use tracing::{debug, warn};

use crate::exchange::RequestDescriptor;
use crate::path::{self, PathExpression};

use super::{detect_operation, ConditionKind, MockCondition, MockRule};

/// Walk the rules in order and return the first one that matches.
pub fn match_rules<'a>(rules: &'a [MockRule], request: &RequestDescriptor) -> Option<&'a MockRule> {
    match_index(rules, request).map(|index| &rules[index])
}

/// Like [`match_rules`] but returns the position, for callers that need to
/// mutate the winning rule (hit counting).
pub fn match_index(rules: &[MockRule], request: &RequestDescriptor) -> Option<usize> {
    let index = rules.iter().position(|rule| rule_matches(rule, request));
    match index {
        Some(index) => debug!(rule = %rules[index].id, index, "request matched rule"),
        None => debug!(url = %request.url, "no rule matched request"),
    }
    index
}

/// Whether one rule matches: enabled, at least one condition, and every
/// condition holds.
pub fn rule_matches(rule: &MockRule, request: &RequestDescriptor) -> bool {
    if !rule.enabled || rule.conditions.is_empty() {
        return false;
    }
    rule.conditions
        .iter()
        .all(|condition| condition_holds(condition, request))
}

fn condition_holds(condition: &MockCondition, request: &RequestDescriptor) -> bool {
    match condition.kind {
        ConditionKind::Url => pattern_matches(condition, &request.url),
        ConditionKind::Contains => pattern_matches(condition, &request.body),
        ConditionKind::SoapAction => request
            .effective_soap_action()
            .map(|action| pattern_matches(condition, action))
            .unwrap_or(false),
        ConditionKind::Operation => detect_operation(request)
            .map(|operation| pattern_matches(condition, &operation))
            .unwrap_or(false),
        ConditionKind::Header => {
            let Some(name) = condition.header_name.as_deref() else {
                return false;
            };
            request
                .header(name)
                .map(|value| pattern_matches(condition, value))
                .unwrap_or(false)
        }
        ConditionKind::XPath => path_holds(&condition.pattern, &request.body),
    }
}

fn pattern_matches(condition: &MockCondition, value: &str) -> bool {
    if condition.is_regex {
        match Regex::new(&condition.pattern) {
            Ok(regex) => regex.is_match(value),
            Err(err) => {
                warn!(pattern = %condition.pattern, %err, "invalid condition regex");
                false
            }
        }
    } else {
        value.contains(&condition.pattern)
    }
}

/// A path condition holds when a Select form resolves to any value, or a
/// Count form resolves to "true".
fn path_holds(pattern: &str, body: &str) -> bool {
    let expression = match PathExpression::parse(pattern) {
        Ok(expression) => expression,
        Err(err) => {
            warn!(%pattern, %err, "invalid condition path");
            return false;
        }
    };
    let Some(document) = crate::document::Document::parse(body) else {
        return false;
    };
    match path::evaluate_document(&document, &expression) {
        Some(value) => match expression {
            PathExpression::Count { .. } => value == "true",
            PathExpression::Select(_) => true,
        },
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: &str, conditions: Vec<MockCondition>) -> MockRule {
        MockRule {
            id: id.to_string(),
            name: None,
            enabled: true,
            conditions,
            status_code: 200,
            response_body: String::new(),
            content_type: None,
            delay_ms: None,
            hit_count: 0,
            recorded_at: None,
        }
    }

    fn url_request(url: &str) -> RequestDescriptor {
        RequestDescriptor {
            url: url.to_string(),
            method: "POST".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn first_match_wins_over_a_more_specific_later_rule() {
        let rules = [
            rule("broad", vec![MockCondition::new(ConditionKind::Url, "/customer")]),
            rule(
                "narrow",
                vec![MockCondition::new(ConditionKind::Url, "/customer/detail")],
            ),
        ];
        let request = url_request("/customer/detail/42");
        assert_eq!(match_rules(&rules, &request).map(|r| r.id.as_str()), Some("broad"));
        assert_eq!(match_index(&rules, &request), Some(0));
    }

    #[test]
    fn disabled_and_conditionless_rules_never_match() {
        let mut disabled = rule("off", vec![MockCondition::new(ConditionKind::Url, "/x")]);
        disabled.enabled = false;
        let empty = rule("empty", vec![]);
        let rules = [disabled, empty];
        assert_eq!(match_rules(&rules, &url_request("/x")), None);
    }

    #[test]
    fn all_conditions_must_hold() {
        let rules = [rule(
            "both",
            vec![
                MockCondition::new(ConditionKind::Url, "/orders"),
                MockCondition::new(ConditionKind::Contains, "priority"),
            ],
        )];
        let mut request = url_request("/orders/new");
        request.body = r#"{"priority": "high"}"#.to_string();
        assert!(match_rules(&rules, &request).is_some());

        request.body = r#"{"speed": "slow"}"#.to_string();
        assert!(match_rules(&rules, &request).is_none());
    }

    #[test]
    fn regex_patterns_and_invalid_regexes() {
        let mut versioned = MockCondition::new(ConditionKind::Url, r"^/api/v\d+/");
        versioned.is_regex = true;
        assert!(rule_matches(&rule("v", vec![versioned.clone()]), &url_request("/api/v2/ping")));
        assert!(!rule_matches(&rule("v", vec![versioned]), &url_request("/api/ping")));

        let mut broken = MockCondition::new(ConditionKind::Url, "(");
        broken.is_regex = true;
        assert!(!rule_matches(&rule("broken", vec![broken]), &url_request("(")));
    }

    #[test]
    fn soap_action_condition_reads_the_header() {
        let rules = [rule(
            "byaction",
            vec![MockCondition::new(ConditionKind::SoapAction, "urn:GetCustomer")],
        )];
        let mut request = url_request("/soap");
        assert!(match_rules(&rules, &request).is_none());

        request.headers.insert(
            "SOAPAction".to_string(),
            "\"urn:GetCustomer\"".to_string(),
        );
        assert!(match_rules(&rules, &request).is_some());
    }

    #[test]
    fn operation_condition_inspects_the_body() {
        let rules = [rule(
            "byop",
            vec![MockCondition::new(ConditionKind::Operation, "GetOrderRequest")],
        )];
        let mut request = url_request("/soap");
        request.body =
            "<soapenv:Envelope><soapenv:Body><ord:GetOrderRequest/></soapenv:Body></soapenv:Envelope>"
                .to_string();
        assert!(match_rules(&rules, &request).is_some());

        request.body = "<soapenv:Envelope><soapenv:Body><ord:CancelOrderRequest/></soapenv:Body></soapenv:Envelope>"
            .to_string();
        assert!(match_rules(&rules, &request).is_none());
    }

    #[test]
    fn header_condition_needs_a_header_name() {
        let nameless = MockCondition::new(ConditionKind::Header, "xml");
        let mut request = url_request("/any");
        request
            .headers
            .insert("Content-Type".to_string(), "text/xml".to_string());
        assert!(!rule_matches(&rule("h", vec![nameless]), &request));

        let mut named = MockCondition::new(ConditionKind::Header, "xml");
        named.header_name = Some("content-type".to_string());
        assert!(rule_matches(&rule("h", vec![named]), &request));
    }

    #[test]
    fn path_conditions_select_and_count() {
        let select = MockCondition::new(ConditionKind::XPath, "//CustomerId");
        let count = MockCondition::new(ConditionKind::XPath, "count(//Item) >= 2");
        let mut request = url_request("/soap");
        request.body =
            "<Req><CustomerId>7</CustomerId><Item/><Item/></Req>".to_string();
        assert!(rule_matches(&rule("s", vec![select.clone()]), &request));
        assert!(rule_matches(&rule("c", vec![count.clone()]), &request));

        request.body = "<Req><Item/></Req>".to_string();
        assert!(!rule_matches(&rule("s", vec![select]), &request));
        assert!(!rule_matches(&rule("c", vec![count]), &request));

        let malformed = MockCondition::new(ConditionKind::XPath, "/a//b");
        assert!(!rule_matches(&rule("m", vec![malformed]), &request));
    }
}
