//! `dbmq-engine` – extraction and routing rules
//!
//! Pure functions over the shared types: no I/O, no shared state. Both bridge
//! loops call into this crate for every event.
//!
//! # Modules
//!
//! - [`path`] – [`PathExpression`][path::PathExpression]: parser for
//!   `Field.[n].['key']` expressions.
//! - [`resolver`] – [`resolve`][resolver::resolve]: walks a
//!   [`Value`][dbmq_types::Value] tree with a path expression, dispatching on
//!   the shape of each node and failing with a typed error on mismatch.
//! - [`table`] – [`MappingTable`][table::MappingTable]: the ordered, immutable
//!   rule set loaded at startup.
//! - [`matcher`] – [`MappingTable::find`][table::MappingTable::find]: first
//!   rule whose locator equals an inbound event's.
//! - [`format`] – canonical string rendering with quote stripping, and the
//!   reverse conversion of broker payloads into typed bus arguments.

pub mod format;
pub mod matcher;
pub mod path;
pub mod resolver;
pub mod table;

pub use format::{format, to_bus_arg};
pub use matcher::{EventLocator, Matched};
pub use path::{PathExpression, Segment};
pub use resolver::{resolve, resolve_str};
pub use table::MappingTable;
