//! Exchange descriptors: the request and response shapes the engines
//! consume. Transports fill these in; nothing here performs I/O.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::document::{sniff_kind, Document, DocumentKind};

/// A completed response as observed by the transport layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResponseDescriptor {
    pub raw_response: String,
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    /// Wall-clock duration of the exchange in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Body format override; sniffed from the content when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<DocumentKind>,
}

impl ResponseDescriptor {
    /// Case-insensitive header lookup, exact casing preferred.
    pub fn header(&self, name: &str) -> Option<&str> {
        lookup(&self.headers, name)
    }

    /// Effective body format, honoring an explicit override.
    pub fn document_kind(&self) -> Option<DocumentKind> {
        self.language.or_else(|| sniff_kind(&self.raw_response))
    }

    pub fn parse_body(&self) -> Option<Document> {
        Document::parse_as(&self.raw_response, self.document_kind()?)
    }
}

/// An inbound request as observed by the mock listener.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RequestDescriptor {
    pub url: String,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub soap_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
}

impl RequestDescriptor {
    pub fn header(&self, name: &str) -> Option<&str> {
        lookup(&self.headers, name)
    }

    /// SOAPAction from the descriptor, falling back to the header, with
    /// the customary surrounding quotes stripped.
    pub fn effective_soap_action(&self) -> Option<&str> {
        self.soap_action
            .as_deref()
            .or_else(|| self.header("SOAPAction"))
            .map(|value| value.trim_matches('"'))
    }
}

fn lookup<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    if let Some(value) = headers.get(name) {
        return Some(value.as_str());
    }
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
