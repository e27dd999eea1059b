pub mod classification;
pub mod keyword;
pub mod llm;
pub mod template;
pub mod ticket;

pub use classification::ClassificationService;
pub use llm::build_provider;
pub use template::PromptTemplateService;
pub use ticket::TicketService;
