//! # onemilk
//!
//! Mount/unmount lifecycle for embedding the OneMilk storefront into a host
//! page as a micro-frontend.
//!
//! A host page asks the [`loader::Loader`] to mount the app into a container.
//! The loader injects the stylesheet and the application script, and once the
//! script has loaded it calls the render capability, which on the application
//! side is a [`entry::MountEntry`]. The returned [`loader::MountHandle`] tears
//! everything down again.
//!
//! ```
//! use onemilk::prelude::*;
//!
//! let cfg = LoaderConfig::default().with_base_path("/shop");
//! assert_eq!(cfg.stylesheet_href(), "/shop/index.css");
//! assert_eq!(cfg.script_src(), "/shop/main.js");
//! ```
//!
//! ## Feature Flags
//!
//! - `web`: `web-sys` page adapter and the `renderOneMilk` global bridge
//!   (wasm32 only)
//!
//! ## Modules
//!
//! - [`config`]: loader options and their defaults
//! - [`context`]: per-page embedding state
//! - [`host`]: the page operations the lifecycle needs
//! - [`loader`]: asset injection and the per-instance state machine
//! - [`entry`]: render capability and standalone bootstrap

#[path = "core/config.rs"]
pub mod config;

#[path = "core/context.rs"]
pub mod context;

#[path = "core/entry.rs"]
pub mod entry;

#[path = "core/error.rs"]
pub mod error;

#[path = "core/host.rs"]
pub mod host;

#[path = "core/loader.rs"]
pub mod loader;

#[path = "core/render.rs"]
pub mod render;

#[cfg(all(feature = "web", target_arch = "wasm32"))]
#[path = "core/web_page.rs"]
pub mod web_page;

#[cfg(test)]
#[path = "core/fake_page.rs"]
mod fake_page;

/// Prelude module for convenient imports.
///
/// ```
/// use onemilk::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::LoaderConfig;
    pub use crate::context::MountContext;
    pub use crate::entry::{MountEntry, Mounter, STANDALONE_ROOT_ID};
    pub use crate::error::{MountError, Result};
    pub use crate::host::{HostPage, ScriptSettle};
    pub use crate::loader::{InstanceId, Loader, MountHandle, Phase, Settled};
    pub use crate::render::{RenderHandle, Renderer};
}
