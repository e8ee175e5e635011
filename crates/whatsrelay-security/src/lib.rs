pub mod redaction;

pub use redaction::{RedactingWriter, mask_secret, redact_secrets};
