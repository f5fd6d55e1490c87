//! `Taskdeck` suggestion proxy library.
//!
//! Exposes the proxy server for use in tests and embedding. The proxy
//! holds the completion API credential server-side and turns a prompt
//! into a list of suggested task titles.

pub mod completion;
pub mod config;
pub mod server;
