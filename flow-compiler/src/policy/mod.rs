//! JSON policy documents
//!
//! Documents are read from and written to strings; file access is up to the caller.

mod firewall;
mod te;

pub use firewall::{firewall_from_json, firewall_to_json};
pub use te::{te_from_json, te_to_json};

use crate::error::PolicyError;

fn malformed(e: serde_json::Error) -> PolicyError {
    PolicyError::MalformedPolicy(e.to_string())
}
