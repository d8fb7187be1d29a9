//! Evaluation core for API test definitions: path expressions over XML and
//! JSON bodies, typed assertions, variable extraction, mock rule matching,
//! and a sandboxed scripting contract.
//!
//! Everything here is offline. Descriptors describe traffic some transport
//! already captured; no module opens a socket.
//!
//! # Example
//!
//! ```
//! let body = r#"{"data": {"id": 123}}"#;
//! let id = assay_engine::path::evaluate(body, "//data/id").unwrap();
//! assert_eq!(id.as_deref(), Some("123"));
//! ```

// ===== Document model and path language =====
pub mod document;
pub mod path;

// ===== Exchange shapes =====
pub mod exchange;

// ===== Evaluation engines =====
pub mod assertion;
pub mod extractor;
pub mod mock;
pub mod scripting;

// ===== Definitions and templating =====
pub mod suite;
pub mod vars;
