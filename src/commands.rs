//! Chat commands: `!verb [parameter]` parsed into a closed `Verb` table and
//! dispatched against the engine, the fetcher and the live settings.

mod access;
mod dispatch;
mod verb;

pub use dispatch::Dispatcher;
