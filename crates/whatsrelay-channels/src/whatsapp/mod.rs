pub mod api;
pub mod payload;
pub mod webhook;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use whatsrelay_common::Result;

pub use api::WhatsAppSender;
pub use payload::{PlatformError, StatusUpdate, WebhookEvent, parse_event};
pub use webhook::{WhatsAppState, whatsapp_verify, whatsapp_webhook};

/// Callback that turns an inbound text into reply text.
///
/// Arguments: `(sender_id, text)`. An `Err` makes the relay send its fallback reply.
pub type WhatsAppOnMessageFn = Arc<
    dyn Fn(String, String) -> Pin<Box<dyn Future<Output = Result<String>> + Send>> + Send + Sync,
>;
