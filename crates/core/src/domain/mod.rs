pub mod chat;
pub mod contact;
pub mod document;
pub mod notification;
