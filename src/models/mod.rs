pub mod chat;
pub mod timeline;
