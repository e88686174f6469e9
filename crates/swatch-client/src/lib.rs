//! `swatch-client` - component views over the swatch server.
//!
//! [`view::ComponentView`] holds all state of one component page and never
//! performs I/O itself. [`driver::ViewDriver`] executes its requests through
//! a [`transport::Transport`], feeds push events back in and fires its
//! debounce timers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]

/// Client configuration.
pub mod config;
/// Debounced write scheduling.
pub mod debounce;
/// Event loop around a component view.
pub mod driver;
/// Client errors.
pub mod error;
/// Navigation entries published per component.
pub mod navigation;
/// Preview frame lifecycle.
pub mod preview;
/// Push channel subscription.
pub mod push;
/// Page scroll lock.
pub mod scroll;
/// HTTP transport.
pub mod transport;
/// Component view state machine.
pub mod view;

pub use config::ClientConfig;
pub use error::ClientError;
pub use view::ComponentView;
