// Policy source access
//
// Read-only client for the policy store's data API plus the two-step rule
// resolution (node id -> tier label -> numeric rate) the document encodes.

pub mod opa;
pub mod rules;

pub use opa::{OpaClient, PolicySource};
pub use rules::PolicyRule;
