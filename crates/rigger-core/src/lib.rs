//! Data model for the rigger deployment engine.
//!
//! This crate defines the wire types shared by the engine, the loader, and
//! the CLI:
//!
//! - [`Value`]: the recursive value language used in job and template files
//!   (literals, `{{...}}` references, and tagged computation specs)
//! - [`Job`], [`Action`], [`Template`]: the unit of work and its containers
//! - [`Network`]: a typed network descriptor with a `custom` extension map
//! - [`Contract`]: a compiled-contract artifact descriptor
//! - [`EngineEvent`] / [`EventSink`]: the engine's observable event stream
//!
//! Everything here is plain data: no I/O, no RPC, no async.

pub mod contract;
pub mod events;
pub mod job;
pub mod network;
pub mod template;
pub mod value;

pub use contract::Contract;
pub use events::{EngineEvent, EventSink, NullSink, Severity};
pub use job::{Action, Job};
pub use network::Network;
pub use template::{Template, TemplateSetup};
pub use value::{SpecKind, Value, ValueSpec};
