use std::cell::{Cell, RefCell};

use crate::host::HostPage;

/// Per-page embedding state shared between the loader and the mount entry.
///
/// Inside one bundle both sides hold the same `MountContext`. Across bundles
/// the loader mirrors it onto the page globals and the application rebuilds
/// it with [`MountContext::observe`].
#[derive(Debug, Default)]
pub struct MountContext {
    embedded: Cell<bool>,
    api_base: RefCell<Option<String>>,
}

impl MountContext {
    pub fn standalone() -> Self {
        Self::default()
    }

    pub fn embedded() -> Self {
        let ctx = Self::default();
        ctx.embedded.set(true);
        ctx
    }

    /// Snapshot the page globals. Called once when the application bundle
    /// initializes; later changes to the page are not picked up.
    pub fn observe<H: HostPage>(page: &H) -> Self {
        Self {
            embedded: Cell::new(page.embedding_flag()),
            api_base: RefCell::new(page.api_base()),
        }
    }

    pub fn is_embedded(&self) -> bool {
        self.embedded.get()
    }

    pub fn mark_embedded(&self) {
        self.embedded.set(true);
    }

    pub fn api_base(&self) -> Option<String> {
        self.api_base.borrow().clone()
    }

    pub fn set_api_base(&self, base: impl Into<String>) {
        *self.api_base.borrow_mut() = Some(base.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_page::FakePage;

    #[test]
    fn observe_reads_page_globals() {
        let page = FakePage::new();
        assert!(!MountContext::observe(&page).is_embedded());

        page.set_embedding_flag(true).unwrap();
        page.set_api_base("/v2").unwrap();
        let ctx = MountContext::observe(&page);
        assert!(ctx.is_embedded());
        assert_eq!(ctx.api_base().as_deref(), Some("/v2"));
    }

    #[test]
    fn observe_is_a_snapshot() {
        let page = FakePage::new();
        let ctx = MountContext::observe(&page);
        page.set_embedding_flag(true).unwrap();
        assert!(!ctx.is_embedded());
    }
}
