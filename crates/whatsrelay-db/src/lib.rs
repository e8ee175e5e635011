pub mod exchange_log;

pub use exchange_log::ExchangeLog;
