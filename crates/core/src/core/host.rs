//! The page operations the mount lifecycle relies on.
//!
//! The browser implementation lives in `web_page` (feature `web`); tests use an
//! in-memory page.

use crate::error::Result;

/// Outcome of a script element: `Ok` on its load event, `Err(reason)` on its
/// error event.
pub type ScriptSettle = std::result::Result<(), String>;

/// Called at most once, from the page's event loop. Also used for the
/// renderer-ready wait, where `Err(reason)` means the page gave up.
pub type ScriptCallback = Box<dyn FnOnce(ScriptSettle)>;

pub trait HostPage {
    type Node: Clone;

    fn element_by_id(&self, id: &str) -> Option<Self::Node>;

    /// Create a `div` with the given id and append it to the body.
    fn create_container(&self, id: &str) -> Result<Self::Node>;

    /// Append `class` to the node's class list, keeping existing classes.
    fn add_class(&self, node: &Self::Node, class: &str) -> Result<()>;

    fn embedding_flag(&self) -> bool;
    fn set_embedding_flag(&self, embedded: bool) -> Result<()>;

    fn api_base(&self) -> Option<String>;
    fn set_api_base(&self, base: &str) -> Result<()>;

    /// Append `<link rel="stylesheet">` to the head.
    fn append_stylesheet(&self, href: &str) -> Result<Self::Node>;

    /// Append a module `<script>` to the body. `on_settle` must be wired before the
    /// element is attached so a cached script cannot settle unobserved.
    fn append_script(&self, src: &str, on_settle: ScriptCallback) -> Result<Self::Node>;

    /// Call `on_ready` once an application bundle announces its render
    /// function, or with `Err` when the page stops waiting. Used when the
    /// bundle initialises asynchronously after its script's load event.
    fn await_renderer(&self, on_ready: ScriptCallback) -> Result<()>;

    /// Detach a node injected by this page.
    fn remove(&self, node: &Self::Node) -> Result<()>;
}
