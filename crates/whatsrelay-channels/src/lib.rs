pub mod traits;
pub mod whatsapp;

pub use traits::ChannelSender;
pub use whatsapp::{WhatsAppOnMessageFn, WhatsAppSender, WhatsAppState};
