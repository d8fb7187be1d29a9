//! Rule synthesis from observed traffic.

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::exchange::{RequestDescriptor, ResponseDescriptor};

use super::{detect_operation, ConditionKind, MockCondition, MockRule};

/// Turn one observed exchange into a replayable rule.
///
/// Conditions are the most specific things the request offers: the
/// operation name and the SOAPAction when present, the URL otherwise.
/// Recorded rules start disabled so a recording pass cannot shadow live
/// dispatch until someone reviews them.
pub fn rule_from_exchange(
    request: &RequestDescriptor,
    response: &ResponseDescriptor,
) -> MockRule {
    let mut conditions = Vec::new();
    let operation = detect_operation(request);
    if let Some(operation) = &operation {
        conditions.push(MockCondition::new(ConditionKind::Operation, operation.clone()));
    }
    if let Some(action) = request.effective_soap_action() {
        if !action.is_empty() {
            conditions.push(MockCondition::new(ConditionKind::SoapAction, action));
        }
    }
    if conditions.is_empty() {
        conditions.push(MockCondition::new(ConditionKind::Url, request.url.clone()));
    }

    let label = operation.unwrap_or_else(|| request.url.clone());
    let rule = MockRule {
        id: Uuid::new_v4().to_string(),
        name: Some(format!("Recorded {label}")),
        enabled: false,
        conditions,
        status_code: response.status_code,
        response_body: response.raw_response.clone(),
        content_type: response.header("Content-Type").map(str::to_string),
        delay_ms: None,
        hit_count: 0,
        recorded_at: Some(Utc::now()),
    };
    debug!(rule = %rule.id, name = ?rule.name, "recorded rule from exchange");
    rule
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soap_exchange_records_operation_and_action() {
        let mut request = RequestDescriptor {
            url: "/ws/orders".to_string(),
            method: "POST".to_string(),
            body: "<soapenv:Envelope><soapenv:Body><GetOrderRequest/></soapenv:Body></soapenv:Envelope>"
                .to_string(),
            ..Default::default()
        };
        request
            .headers
            .insert("SOAPAction".to_string(), "\"urn:GetOrder\"".to_string());
        let mut response = ResponseDescriptor {
            raw_response: "<GetOrderResponse><Id>1</Id></GetOrderResponse>".to_string(),
            status_code: 200,
            ..Default::default()
        };
        response
            .headers
            .insert("Content-Type".to_string(), "text/xml".to_string());

        let rule = rule_from_exchange(&request, &response);
        assert!(!rule.enabled);
        assert_eq!(rule.name.as_deref(), Some("Recorded GetOrderRequest"));
        assert_eq!(rule.conditions.len(), 2);
        assert_eq!(rule.conditions[0].kind, ConditionKind::Operation);
        assert_eq!(rule.conditions[0].pattern, "GetOrderRequest");
        assert_eq!(rule.conditions[1].kind, ConditionKind::SoapAction);
        assert_eq!(rule.conditions[1].pattern, "urn:GetOrder");
        assert_eq!(rule.status_code, 200);
        assert_eq!(rule.content_type.as_deref(), Some("text/xml"));
        assert!(rule.recorded_at.is_some());

        // The recorded rule replays its own exchange once enabled.
        let mut enabled = rule.clone();
        enabled.enabled = true;
        assert!(crate::mock::rule_matches(&enabled, &request));
    }

    #[test]
    fn rest_exchange_falls_back_to_the_url() {
        let request = RequestDescriptor {
            url: "/api/customers/7".to_string(),
            method: "GET".to_string(),
            ..Default::default()
        };
        let response = ResponseDescriptor {
            raw_response: r#"{"id": 7}"#.to_string(),
            status_code: 404,
            ..Default::default()
        };
        let rule = rule_from_exchange(&request, &response);
        assert_eq!(rule.conditions.len(), 1);
        assert_eq!(rule.conditions[0].kind, ConditionKind::Url);
        assert_eq!(rule.conditions[0].pattern, "/api/customers/7");
        assert_eq!(rule.name.as_deref(), Some("Recorded /api/customers/7"));
        assert_eq!(rule.status_code, 404);
        assert_eq!(rule.content_type, None);
    }
}
