//! Digitone parameter model for SynthGenie.
//!
//! - [`ParameterCatalog`]: every controllable parameter, its MIDI address and
//!   its value domain.
//! - [`codec`]: bit-exact display value to wire value conversion.
//! - [`MessageBuilder`]: turns a parameter, channel and value into a
//!   [`ParameterChangeMessage`].
//! - [`ToolRegistry`]: one named tool per parameter, grouped per machine.
//!
//! Pure data and encoding. Nothing here does I/O.
//!
//! ```rust
//! use genieparams::{MessageBuilder, ParameterCatalog};
//!
//! let catalog = ParameterCatalog::digitone().unwrap();
//! let msg = MessageBuilder::new(&catalog)
//!     .build("multi_mode_filter.frequency", 1, &63.0.into(), "set_multi_mode_filter_frequency")
//!     .unwrap();
//! assert_eq!(msg.value, 8127);
//! ```

pub mod catalog;
pub mod codec;
pub mod message;
pub mod tools;
pub mod types;

pub use catalog::{CatalogError, ParameterCatalog};
pub use codec::{decode, encode, DomainError};
pub use message::{
    build_message, AmbiguousResult, BuildError, MessageBuilder, MessageViolation,
    ParameterChangeMessage, MAX_CHANNEL, MIN_CHANNEL,
};
pub use tools::{ToolArgs, ToolError, ToolInfo, ToolRegistry, ToolSet, ToolSpec};
pub use types::{
    Addressing, Counter, DisplayValue, Domain, EnumDomain, EnumOption, Machine,
    MultiCounterDomain, ParameterDefinition, RangeDomain, Section, MAX_14BIT, MAX_7BIT,
};
