pub mod caller;
pub mod capabilities;

pub use caller::{caller_from_context, Caller};
pub use capabilities::{require_capabilities, require_self_or, Capability, Role};
