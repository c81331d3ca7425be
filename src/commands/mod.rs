pub mod chat;
pub mod links;
pub mod settings;
