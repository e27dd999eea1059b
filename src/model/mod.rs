pub mod classification;
pub mod config;
pub mod template;
pub mod ticket;

pub use classification::*;
pub use config::{ClassifierConfig, Config, GuardrailConfig, ProviderKind};
pub use template::PromptTemplate;
pub use ticket::{MAX_MESSAGE_CHARS, MIN_MESSAGE_CHARS, NewTicket, Ticket};
