//! HTTP request handlers.

pub mod books;
pub mod catalog;
pub mod reading;
pub mod status;
