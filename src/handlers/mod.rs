pub mod chat;
pub mod web;
