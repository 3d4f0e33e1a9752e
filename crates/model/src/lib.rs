//! Entity model and command vocabulary for the tether sync engine.
//!
//! This crate defines the minimal addressable units of shared state:
//! * `Value`: a kind-tagged primitive carried by attributes and action calls
//! * `Attribute`: one synchronized named value slot
//! * `PresentationModel`: a named bundle of attributes
//! * `Command`: one atomic, wire-transferable mutation or lifecycle event

#![warn(missing_docs)]

pub mod attribute;
pub mod command;
pub mod presentation_model;
pub mod value;

pub use attribute::{Attribute, AttributeSpec};
pub use command::{ActionParam, Command};
pub use presentation_model::PresentationModel;
pub use value::Value;
