//! PML UI - the composite UI generator (§4.9).
//!
//! A deterministic, pure pipeline from collected per-tool UI resources
//! plus an orchestration config to a resolved [`pml_core::ui::CompositeUiDescriptor`]
//! and its rendered HTML document. No I/O, no randomness beyond the
//! caller-supplied workflow id.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod error;
pub mod generator;
pub mod html;
pub mod resolve;

pub use error::{UiError, UiResult};
pub use generator::{build_composite_ui, validate_slots};
pub use html::{render_html, UI_PROTOCOL_VERSION};
