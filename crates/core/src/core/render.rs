use std::fmt;

/// Single-shot teardown for a mounted UI tree.
///
/// Dropping a handle without calling [`RenderHandle::unmount`] drops the
/// teardown closure and whatever it captured; it does not run it.
pub struct RenderHandle {
    teardown: Option<Box<dyn FnOnce()>>,
}

impl RenderHandle {
    pub fn new(teardown: impl FnOnce() + 'static) -> Self {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    pub fn unmount(mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }

    /// Keep the mounted tree (and everything the teardown captured) alive for
    /// the rest of the page's life.
    pub fn keep_alive(self) {
        std::mem::forget(self);
    }
}

impl fmt::Debug for RenderHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderHandle")
            .field("armed", &self.teardown.is_some())
            .finish()
    }
}

/// The render capability the loader calls once the application script loaded.
///
/// Mirrors the page-level `renderOneMilk(containerId, basePath)` function:
/// `None` means nothing was mounted.
pub trait Renderer {
    fn render(&self, container_id: &str, base_path: &str) -> Option<RenderHandle>;

    /// Whether the capability can be called right now. A bridge to a function
    /// that another bundle publishes reports `false` until it appears.
    fn is_available(&self) -> bool {
        true
    }
}

impl<R: Renderer + ?Sized> Renderer for std::rc::Rc<R> {
    fn render(&self, container_id: &str, base_path: &str) -> Option<RenderHandle> {
        (**self).render(container_id, base_path)
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}
