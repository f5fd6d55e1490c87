//! `Taskdeck`: session-gated reactive task sync.
//!
//! [`session::SessionManager`] tracks who is signed in,
//! [`sync::TaskCollectionSync`] mirrors that user's task collection, and
//! [`binding::SessionBinding`] keeps the two in step. [`suggest`] talks to
//! the task-suggestion proxy.

pub mod binding;
pub mod config;
pub mod route;
pub mod session;
pub mod subscription;
pub mod suggest;
pub mod sync;
