//! Shared data contracts for `Taskdeck`: the task record every consumer
//! agrees on and the wire types of the task-suggestion proxy.

pub mod suggest;
pub mod task;
