//! Editor protocol: command vocabulary and the dispatcher driving it

pub mod command;
pub mod dispatcher;

pub use command::{Command, HeaderBlock, IncomingCommand, OpenRequest};
pub use dispatcher::CommandDispatcher;

// vim: ts=4
