//! Application-side mount entry point.
//!
//! [`MountEntry`] is what the page-level `renderOneMilk` function calls into,
//! and what the standalone bootstrap uses when no host is present.

use tracing::{debug, info, warn};

use crate::context::MountContext;
use crate::host::HostPage;
use crate::render::{RenderHandle, Renderer};

/// Element the standalone HTML shell provides.
pub const STANDALONE_ROOT_ID: &str = "root";

/// Builds the root UI tree inside a node.
pub trait Mounter<N> {
    /// `base_path` is the router base, so in-app links stay under the
    /// host-provided prefix.
    fn mount(&self, node: &N, base_path: &str) -> RenderHandle;
}

pub struct MountEntry<H, M> {
    page: H,
    mounter: M,
}

impl<H: HostPage, M: Mounter<H::Node>> MountEntry<H, M> {
    pub fn new(page: H, mounter: M) -> Self {
        Self { page, mounter }
    }

    /// Self-mount into [`STANDALONE_ROOT_ID`] unless a host embeds the app.
    ///
    /// The handle is never exposed to a host; callers usually keep it alive
    /// until the page goes away.
    pub fn bootstrap(&self, ctx: &MountContext) -> Option<RenderHandle> {
        if ctx.is_embedded() {
            debug!("embedded: waiting for the loader to call render");
            return None;
        }
        info!("standalone: mounting into #{}", STANDALONE_ROOT_ID);
        self.render(STANDALONE_ROOT_ID, "")
    }
}

impl<H: HostPage, M: Mounter<H::Node>> Renderer for MountEntry<H, M> {
    fn render(&self, container_id: &str, base_path: &str) -> Option<RenderHandle> {
        let Some(node) = self.page.element_by_id(container_id) else {
            warn!("render: container #{} not found", container_id);
            return None;
        };
        Some(self.mounter.mount(&node, base_path))
    }
}
