//! Host-side loader: injects the app's assets into a page and tracks each
//! mount instance from injection to teardown.
//!
//! Per instance:
//!
//! ```text
//! Injecting -> AwaitingScript -> [AwaitingRenderer] -> Mounted -> TornDown
//!                                                  \-> Inert  -> TornDown
//! ```
//!
//! A bundle whose render function only appears after its script's load event
//! (async wasm init) is waited for in `AwaitingRenderer` until the page
//! reports it ready or gives up. `Inert` is every settle that produced no UI
//! (script error, no render function, container gone). Unmounting still
//! removes the injected assets. `TornDown` is final. At most one instance per
//! container id is live at a time.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};

use tracing::{debug, info, warn};

use crate::config::LoaderConfig;
use crate::context::MountContext;
use crate::error::{MountError, Result};
use crate::host::{HostPage, ScriptCallback, ScriptSettle};
use crate::render::{RenderHandle, Renderer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mount#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Injecting,
    AwaitingScript,
    AwaitingRenderer,
    Mounted,
    Inert,
    TornDown,
}

impl Phase {
    pub fn is_settled(self) -> bool {
        matches!(self, Phase::Mounted | Phase::Inert | Phase::TornDown)
    }
}

#[derive(Default)]
struct Status {
    phase: Phase,
    outcome: Option<Result<()>>,
    wakers: Vec<Waker>,
}

type SharedStatus = Rc<RefCell<Status>>;

/// Move to `phase` (never out of `TornDown`), record the outcome if none is
/// recorded yet, and wake every waiting [`Settled`].
fn finish(status: &SharedStatus, phase: Phase, outcome: Result<()>) {
    let wakers = {
        let mut st = status.borrow_mut();
        if st.phase != Phase::TornDown {
            st.phase = phase;
        }
        if st.outcome.is_none() {
            st.outcome = Some(outcome);
        }
        std::mem::take(&mut st.wakers)
    };
    for w in wakers {
        w.wake();
    }
}

struct Instance<N> {
    id: InstanceId,
    base_path: String,
    script_src: String,
    stylesheet: N,
    script: Option<N>,
    render: Option<RenderHandle>,
    status: SharedStatus,
}

struct Inner<H: HostPage> {
    page: H,
    ctx: Rc<MountContext>,
    renderer: Box<dyn Renderer>,
    next_id: Cell<u64>,
    live: RefCell<HashMap<String, Instance<H::Node>>>,
}

/// Cheap to clone; clones share the same page and registry.
pub struct Loader<H: HostPage> {
    inner: Rc<Inner<H>>,
}

impl<H: HostPage> Clone for Loader<H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<H: HostPage + 'static> Loader<H> {
    pub fn new(page: H, ctx: Rc<MountContext>, renderer: impl Renderer + 'static) -> Self {
        Self {
            inner: Rc::new(Inner {
                page,
                ctx,
                renderer: Box::new(renderer),
                next_id: Cell::new(1),
                live: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub fn context(&self) -> &Rc<MountContext> {
        &self.inner.ctx
    }

    /// Phase of the live instance for `container_id`, if any.
    pub fn phase(&self, container_id: &str) -> Option<Phase> {
        self.inner
            .live
            .borrow()
            .get(container_id)
            .map(|inst| inst.status.borrow().phase)
    }

    pub fn active_mounts(&self) -> usize {
        self.inner.live.borrow().len()
    }

    /// Inject the app into `container_id`.
    ///
    /// Rejected without side effects when the id is blank or already has a
    /// live instance. On a host failure midway, whatever this call injected is
    /// removed again before the error is returned.
    pub fn load(&self, container_id: &str, config: &LoaderConfig) -> Result<MountHandle<H>> {
        if container_id.trim().is_empty() {
            return Err(MountError::EmptyContainerId);
        }
        if self.inner.live.borrow().contains_key(container_id) {
            warn!("load: #{} already has a live mount", container_id);
            return Err(MountError::AlreadyMounted(container_id.to_string()));
        }

        let id = InstanceId(self.inner.next_id.get());
        self.inner.next_id.set(id.0 + 1);

        let mut injected = Vec::new();
        match self.inject(id, container_id, config, &mut injected) {
            Ok(status) => {
                info!(
                    "{}: injected {} into #{}",
                    id,
                    config.script_src(),
                    container_id
                );
                Ok(MountHandle {
                    inner: self.inner.clone(),
                    container_id: container_id.to_string(),
                    id,
                    status,
                })
            }
            Err(e) => {
                warn!("{}: injection into #{} failed: {}", id, container_id, e);
                self.rollback(id, container_id, injected);
                Err(e)
            }
        }
    }

    fn inject(
        &self,
        id: InstanceId,
        container_id: &str,
        config: &LoaderConfig,
        injected: &mut Vec<H::Node>,
    ) -> Result<SharedStatus> {
        let page = &self.inner.page;

        // The bundle checks this during its own init, which can run as soon as
        // the script element is attached.
        self.inner.ctx.mark_embedded();
        page.set_embedding_flag(true)?;

        let container = match page.element_by_id(container_id) {
            Some(node) => node,
            None => {
                let node = page.create_container(container_id)?;
                injected.push(node.clone());
                node
            }
        };

        if !config.container_class.is_empty() {
            page.add_class(&container, &config.container_class)?;
        }

        if let Some(api_base) = config.api_base() {
            self.inner.ctx.set_api_base(api_base);
            page.set_api_base(api_base)?;
        }

        let stylesheet = page.append_stylesheet(&config.stylesheet_href())?;
        injected.push(stylesheet.clone());

        let status = SharedStatus::default();
        let script_src = config.script_src();
        self.inner.live.borrow_mut().insert(
            container_id.to_string(),
            Instance {
                id,
                base_path: config.base_path.clone(),
                script_src: script_src.clone(),
                stylesheet,
                script: None,
                render: None,
                status: status.clone(),
            },
        );

        let script = page.append_script(
            &script_src,
            self.event_callback(id, container_id, Self::settle),
        )?;
        injected.push(script.clone());

        if let Some(inst) = self.inner.live.borrow_mut().get_mut(container_id) {
            if inst.id == id {
                inst.script = Some(script);
            }
        }
        {
            let mut st = status.borrow_mut();
            if st.phase == Phase::Injecting {
                st.phase = Phase::AwaitingScript;
            }
        }
        debug!("{}: awaiting {}", id, script_src);
        Ok(status)
    }

    fn rollback(&self, id: InstanceId, container_id: &str, injected: Vec<H::Node>) {
        let removed = {
            let mut live = self.inner.live.borrow_mut();
            match live.get(container_id) {
                Some(inst) if inst.id == id => live.remove(container_id),
                _ => None,
            }
        };
        if let Some(inst) = removed {
            finish(&inst.status, Phase::TornDown, Err(MountError::Aborted));
            // A host may settle the script before reporting the append failed.
            if let Some(handle) = inst.render {
                handle.unmount();
            }
        }
        for node in injected.iter().rev() {
            if let Err(e) = self.inner.page.remove(node) {
                warn!("{}: rollback could not remove a node: {}", id, e);
            }
        }
    }

    /// Route a page event for `id` back into the loader, if it still exists.
    fn event_callback(
        &self,
        id: InstanceId,
        container_id: &str,
        on_event: fn(&Self, InstanceId, &str, ScriptSettle),
    ) -> ScriptCallback {
        let weak: Weak<Inner<H>> = Rc::downgrade(&self.inner);
        let container_id = container_id.to_string();
        Box::new(move |outcome| match weak.upgrade() {
            Some(inner) => on_event(&Loader { inner }, id, &container_id, outcome),
            None => debug!("{}: page event after the loader was dropped", id),
        })
    }

    /// `(base_path, script_src, status)` of the live instance `id`.
    fn lookup(
        &self,
        id: InstanceId,
        container_id: &str,
    ) -> Option<(String, String, SharedStatus)> {
        let live = self.inner.live.borrow();
        match live.get(container_id) {
            Some(inst) if inst.id == id => Some((
                inst.base_path.clone(),
                inst.script_src.clone(),
                inst.status.clone(),
            )),
            _ => None,
        }
    }

    fn settle(&self, id: InstanceId, container_id: &str, outcome: ScriptSettle) {
        let Some((base_path, script_src, status)) = self.lookup(id, container_id) else {
            debug!("{}: ignoring script event for a torn-down mount", id);
            return;
        };
        let phase = status.borrow().phase;
        if !matches!(phase, Phase::Injecting | Phase::AwaitingScript) {
            warn!("{}: ignoring repeated script event", id);
            return;
        }

        if let Err(reason) = outcome {
            let err = MountError::ScriptLoad {
                src: script_src,
                reason,
            };
            self.conclude(&status, id, container_id, Err(err));
            return;
        }
        if self.inner.renderer.is_available() {
            let result = self.render(id, container_id, &base_path);
            self.conclude(&status, id, container_id, result);
            return;
        }

        status.borrow_mut().phase = Phase::AwaitingRenderer;
        debug!("{}: script loaded, waiting for the render function", id);
        let on_ready = self.event_callback(id, container_id, Self::renderer_ready);
        if let Err(e) = self.inner.page.await_renderer(on_ready) {
            warn!("{}: cannot wait for the render function: {}", id, e);
            self.conclude(&status, id, container_id, Err(MountError::RendererMissing));
        }
    }

    fn renderer_ready(&self, id: InstanceId, container_id: &str, outcome: ScriptSettle) {
        let Some((base_path, _, status)) = self.lookup(id, container_id) else {
            debug!("{}: renderer ready after teardown", id);
            return;
        };
        if status.borrow().phase != Phase::AwaitingRenderer {
            return;
        }
        let result = match outcome {
            Ok(()) if self.inner.renderer.is_available() => self.render(id, container_id, &base_path),
            Ok(()) => Err(MountError::RendererMissing),
            Err(reason) => {
                warn!("{}: stopped waiting for the render function: {}", id, reason);
                Err(MountError::RendererMissing)
            }
        };
        self.conclude(&status, id, container_id, result);
    }

    fn render(&self, id: InstanceId, container_id: &str, base_path: &str) -> Result<()> {
        match self.inner.renderer.render(container_id, base_path) {
            Some(handle) => self.store_render_handle(id, container_id, handle),
            None => Err(MountError::ContainerMissing(container_id.to_string())),
        }
    }

    fn conclude(
        &self,
        status: &SharedStatus,
        id: InstanceId,
        container_id: &str,
        result: Result<()>,
    ) {
        match &result {
            Ok(()) => info!("{}: mounted into #{}", id, container_id),
            Err(e) => warn!("{}: nothing mounted: {}", id, e),
        }
        let phase = if result.is_ok() {
            Phase::Mounted
        } else {
            Phase::Inert
        };
        finish(status, phase, result);
    }

    fn store_render_handle(
        &self,
        id: InstanceId,
        container_id: &str,
        handle: RenderHandle,
    ) -> Result<()> {
        let orphan = {
            let mut live = self.inner.live.borrow_mut();
            match live.get_mut(container_id) {
                Some(inst) if inst.id == id => {
                    inst.render = Some(handle);
                    None
                }
                _ => Some(handle),
            }
        };
        match orphan {
            // Unmounted from inside the render call.
            Some(handle) => {
                handle.unmount();
                Err(MountError::Aborted)
            }
            None => Ok(()),
        }
    }

    fn unmount(&self, id: InstanceId, container_id: &str) -> Result<bool> {
        let inst = {
            let mut live = self.inner.live.borrow_mut();
            match live.get(container_id) {
                Some(inst) if inst.id == id => live.remove(container_id),
                _ => None,
            }
        };
        let Some(inst) = inst else {
            debug!("{}: already torn down", id);
            return Ok(false);
        };

        finish(&inst.status, Phase::TornDown, Err(MountError::Aborted));

        if let Some(handle) = inst.render {
            handle.unmount();
        }

        let page = &self.inner.page;
        let mut first_err = page.remove(&inst.stylesheet).err();
        if let Some(script) = &inst.script {
            if let Err(e) = page.remove(script) {
                first_err.get_or_insert(e);
            }
        }

        info!("{}: unmounted from #{}", id, container_id);
        match first_err {
            Some(e) => Err(e),
            None => Ok(true),
        }
    }
}

/// Returned by [`Loader::load`]; the host's handle on one mount instance.
pub struct MountHandle<H: HostPage> {
    inner: Rc<Inner<H>>,
    container_id: String,
    id: InstanceId,
    status: SharedStatus,
}

impl<H: HostPage + 'static> MountHandle<H> {
    pub fn instance_id(&self) -> InstanceId {
        self.id
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn phase(&self) -> Phase {
        self.status.borrow().phase
    }

    /// Tear down the UI tree and remove the injected stylesheet and script.
    ///
    /// Returns `Ok(false)` when this instance was already torn down. The
    /// container element stays in the page.
    pub fn unmount(&self) -> Result<bool> {
        Loader {
            inner: self.inner.clone(),
        }
        .unmount(self.id, &self.container_id)
    }

    /// Resolves once the script has settled: `Ok(())` when the app mounted,
    /// otherwise the reason it did not. An instance torn down first resolves
    /// to [`MountError::Aborted`].
    pub fn settled(&self) -> Settled {
        Settled {
            status: self.status.clone(),
        }
    }
}

pub struct Settled {
    status: SharedStatus,
}

impl Future for Settled {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut st = self.status.borrow_mut();
        if let Some(outcome) = &st.outcome {
            return Poll::Ready(outcome.clone());
        }
        if !st.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            st.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::MountEntry;
    use crate::fake_page::{CountingMounter, Fail, FakePage, Op};

    type TestLoader = Loader<FakePage>;

    fn setup(page: &FakePage) -> (TestLoader, CountingMounter) {
        let mounter = CountingMounter::default();
        let entry = MountEntry::new(page.clone(), mounter.clone());
        let loader = Loader::new(page.clone(), Rc::new(MountContext::standalone()), entry);
        (loader, mounter)
    }

    struct Unavailable;

    impl Renderer for Unavailable {
        fn render(&self, _: &str, _: &str) -> Option<RenderHandle> {
            panic!("render called while unavailable");
        }

        fn is_available(&self) -> bool {
            false
        }
    }

    /// Records the page's embedding flag at the moment render is called.
    struct FlagProbe {
        page: FakePage,
        seen: Rc<Cell<Option<bool>>>,
    }

    impl Renderer for FlagProbe {
        fn render(&self, _: &str, _: &str) -> Option<RenderHandle> {
            self.seen.set(Some(self.page.embedding_flag()));
            Some(RenderHandle::new(|| {}))
        }
    }

    /// Available only once the test flips the switch.
    struct LateRenderer {
        entry: MountEntry<FakePage, CountingMounter>,
        available: Rc<Cell<bool>>,
    }

    impl Renderer for LateRenderer {
        fn render(&self, container_id: &str, base_path: &str) -> Option<RenderHandle> {
            self.entry.render(container_id, base_path)
        }

        fn is_available(&self) -> bool {
            self.available.get()
        }
    }

    fn late_renderer(page: &FakePage) -> (LateRenderer, Rc<Cell<bool>>, CountingMounter) {
        let mounter = CountingMounter::default();
        let available = Rc::new(Cell::new(false));
        let renderer = LateRenderer {
            entry: MountEntry::new(page.clone(), mounter.clone()),
            available: available.clone(),
        };
        (renderer, available, mounter)
    }

    /// Mounts, then unmounts every live instance before returning.
    struct UnmountsWhileRendering {
        entry: MountEntry<FakePage, CountingMounter>,
        slot: Rc<RefCell<Option<TestLoader>>>,
    }

    impl Renderer for UnmountsWhileRendering {
        fn render(&self, container_id: &str, base_path: &str) -> Option<RenderHandle> {
            let handle = self.entry.render(container_id, base_path);
            if let Some(loader) = self.slot.borrow().as_ref() {
                let live: Vec<(InstanceId, String)> = loader
                    .inner
                    .live
                    .borrow()
                    .iter()
                    .map(|(cid, inst)| (inst.id, cid.clone()))
                    .collect();
                for (id, cid) in live {
                    loader.unmount(id, &cid).unwrap();
                }
            }
            handle
        }
    }

    #[test]
    fn default_config_injects_default_assets() {
        let page = FakePage::new();
        let (loader, _) = setup(&page);

        let handle = loader.load("root", &LoaderConfig::default()).unwrap();

        assert_eq!(page.stylesheets(), vec!["/index.css".to_string()]);
        assert_eq!(page.scripts(), vec!["/main.js".to_string()]);
        assert_eq!(page.classes_of("root"), vec!["onemilk-container".to_string()]);
        assert_eq!(page.count_with_id("root"), 1);
        assert_eq!(page.api_base().as_deref(), Some("/api"));
        assert_eq!(handle.phase(), Phase::AwaitingScript);
        assert_eq!(loader.phase("root"), Some(Phase::AwaitingScript));
    }

    #[test]
    fn custom_config_propagates_to_assets_and_api_base() {
        let page = FakePage::new();
        let (loader, _) = setup(&page);
        let cfg = LoaderConfig::default()
            .with_base_path("/app")
            .with_css_path("/style.css")
            .with_js_path("/bundle.js")
            .with_api_base_path("/v2");

        loader.load("root", &cfg).unwrap();

        assert_eq!(page.stylesheets(), vec!["/app/style.css".to_string()]);
        assert_eq!(page.scripts(), vec!["/app/bundle.js".to_string()]);
        assert_eq!(page.api_base().as_deref(), Some("/v2"));
        assert_eq!(loader.context().api_base().as_deref(), Some("/v2"));
    }

    #[test]
    fn empty_api_base_is_not_published() {
        let page = FakePage::new();
        let (loader, _) = setup(&page);
        loader
            .load("root", &LoaderConfig::default().with_api_base_path(""))
            .unwrap();
        assert_eq!(page.api_base(), None);
        assert!(!page.ops().iter().any(|op| matches!(op, Op::SetApiBase(_))));
    }

    #[test]
    fn embedding_flag_is_set_before_script_is_attached() {
        let page = FakePage::new();
        let seen = Rc::new(Cell::new(None));
        let probe = FlagProbe {
            page: page.clone(),
            seen: seen.clone(),
        };
        let loader = Loader::new(page.clone(), Rc::new(MountContext::standalone()), probe);

        loader.load("root", &LoaderConfig::default()).unwrap();

        let ops = page.ops();
        assert_eq!(ops.first(), Some(&Op::SetEmbedded(true)));
        let script_at = ops
            .iter()
            .position(|op| matches!(op, Op::AppendScript(_)))
            .unwrap();
        let css_at = ops
            .iter()
            .position(|op| matches!(op, Op::AppendStylesheet(_)))
            .unwrap();
        assert!(css_at < script_at);
        assert!(loader.context().is_embedded());

        assert!(page.fire_script_load("/main.js"));
        assert_eq!(seen.get(), Some(true));
    }

    #[test]
    fn existing_container_is_reused() {
        let page = FakePage::with_element("root");
        let (loader, _) = setup(&page);

        let first = loader.load("root", &LoaderConfig::default()).unwrap();
        assert!(!page.ops().iter().any(|op| matches!(op, Op::CreateContainer(_))));
        first.unmount().unwrap();

        loader.load("root", &LoaderConfig::default()).unwrap();
        assert_eq!(page.count_with_id("root"), 1);
        assert_eq!(page.classes_of("root"), vec!["onemilk-container".to_string()]);
    }

    #[test]
    fn created_container_survives_unmount_and_is_reused() {
        let page = FakePage::new();
        let (loader, _) = setup(&page);

        loader
            .load("root", &LoaderConfig::default())
            .unwrap()
            .unmount()
            .unwrap();
        loader.load("root", &LoaderConfig::default()).unwrap();

        let created = page
            .ops()
            .iter()
            .filter(|op| matches!(op, Op::CreateContainer(_)))
            .count();
        assert_eq!(created, 1);
        assert_eq!(page.count_with_id("root"), 1);
    }

    #[test]
    fn script_load_mounts_with_base_path() {
        let page = FakePage::new();
        let (loader, mounter) = setup(&page);
        let handle = loader
            .load("root", &LoaderConfig::default().with_base_path("/app"))
            .unwrap();

        assert!(page.fire_script_load("/app/main.js"));

        assert_eq!(handle.phase(), Phase::Mounted);
        let node = page.element_by_id("root").unwrap();
        assert_eq!(mounter.mounts(), vec![(node, "/app".to_string())]);
        assert_eq!(pollster::block_on(handle.settled()), Ok(()));
    }

    #[test]
    fn unmount_tears_down_tree_and_assets_once() {
        let page = FakePage::new();
        let (loader, mounter) = setup(&page);
        let handle = loader.load("root", &LoaderConfig::default()).unwrap();
        page.fire_script_load("/main.js");
        assert_eq!(page.stylesheets().len(), 1);
        assert_eq!(page.scripts().len(), 1);

        assert_eq!(handle.unmount(), Ok(true));

        assert_eq!(mounter.teardowns(), 1);
        assert!(page.stylesheets().is_empty());
        assert!(page.scripts().is_empty());
        assert_eq!(handle.phase(), Phase::TornDown);
        assert_eq!(loader.phase("root"), None);
        assert_eq!(loader.active_mounts(), 0);

        let ops_before = page.ops().len();
        assert_eq!(handle.unmount(), Ok(false));
        assert_eq!(mounter.teardowns(), 1);
        assert_eq!(page.ops().len(), ops_before);

        // A mounted outcome is not rewritten by teardown.
        assert_eq!(pollster::block_on(handle.settled()), Ok(()));
    }

    #[test]
    fn missing_container_at_render_leaves_instance_inert() {
        let page = FakePage::new();
        let (loader, mounter) = setup(&page);
        let handle = loader.load("root", &LoaderConfig::default()).unwrap();

        page.detach_by_id("root");
        assert!(page.fire_script_load("/main.js"));

        assert_eq!(handle.phase(), Phase::Inert);
        assert!(mounter.mounts().is_empty());
        assert_eq!(
            pollster::block_on(handle.settled()),
            Err(MountError::ContainerMissing("root".to_string()))
        );

        assert_eq!(handle.unmount(), Ok(true));
        assert_eq!(mounter.teardowns(), 0);
        assert!(page.stylesheets().is_empty());
        assert!(page.scripts().is_empty());
    }

    #[test]
    fn script_error_is_reported() {
        let page = FakePage::new();
        let (loader, mounter) = setup(&page);
        let handle = loader.load("root", &LoaderConfig::default()).unwrap();

        assert!(page.fire_script_error("/main.js", "net::ERR_FAILED"));

        assert_eq!(handle.phase(), Phase::Inert);
        assert!(mounter.mounts().is_empty());
        assert_eq!(
            pollster::block_on(handle.settled()),
            Err(MountError::ScriptLoad {
                src: "/main.js".to_string(),
                reason: "net::ERR_FAILED".to_string(),
            })
        );
        assert_eq!(handle.unmount(), Ok(true));
        assert!(page.scripts().is_empty());
    }

    #[test]
    fn renderer_wait_that_expires_leaves_instance_inert() {
        let page = FakePage::new();
        let loader = Loader::new(
            page.clone(),
            Rc::new(MountContext::standalone()),
            Unavailable,
        );
        let handle = loader.load("root", &LoaderConfig::default()).unwrap();
        page.fire_script_load("/main.js");
        assert_eq!(handle.phase(), Phase::AwaitingRenderer);
        assert_eq!(page.renderer_waiters(), 1);

        assert_eq!(page.expire_renderer_waits("timed out"), 1);

        assert_eq!(handle.phase(), Phase::Inert);
        assert_eq!(
            pollster::block_on(handle.settled()),
            Err(MountError::RendererMissing)
        );
        assert_eq!(handle.unmount(), Ok(true));
        assert!(page.scripts().is_empty());
    }

    #[test]
    fn renderer_published_after_script_load_is_awaited() {
        let page = FakePage::new();
        let (renderer, available, mounter) = late_renderer(&page);
        let loader = Loader::new(page.clone(), Rc::new(MountContext::standalone()), renderer);
        let handle = loader
            .load("root", &LoaderConfig::default().with_base_path("/app"))
            .unwrap();

        assert!(page.fire_script_load("/app/main.js"));
        assert_eq!(handle.phase(), Phase::AwaitingRenderer);
        assert!(mounter.mounts().is_empty());

        available.set(true);
        assert_eq!(page.announce_renderer(), 1);

        assert_eq!(handle.phase(), Phase::Mounted);
        let node = page.element_by_id("root").unwrap();
        assert_eq!(mounter.mounts(), vec![(node, "/app".to_string())]);
        assert_eq!(pollster::block_on(handle.settled()), Ok(()));

        handle.unmount().unwrap();
        assert_eq!(mounter.teardowns(), 1);
    }

    #[test]
    fn announcement_without_render_function_is_reported() {
        let page = FakePage::new();
        let (renderer, _, mounter) = late_renderer(&page);
        let loader = Loader::new(page.clone(), Rc::new(MountContext::standalone()), renderer);
        let handle = loader.load("root", &LoaderConfig::default()).unwrap();

        page.fire_script_load("/main.js");
        page.announce_renderer();

        assert_eq!(handle.phase(), Phase::Inert);
        assert!(mounter.mounts().is_empty());
        assert_eq!(
            pollster::block_on(handle.settled()),
            Err(MountError::RendererMissing)
        );
    }

    #[test]
    fn unmount_while_awaiting_renderer_ignores_late_announcement() {
        let page = FakePage::new();
        let (renderer, available, mounter) = late_renderer(&page);
        let loader = Loader::new(page.clone(), Rc::new(MountContext::standalone()), renderer);
        let handle = loader.load("root", &LoaderConfig::default()).unwrap();
        page.fire_script_load("/main.js");

        assert_eq!(handle.unmount(), Ok(true));
        available.set(true);
        assert_eq!(page.announce_renderer(), 1);

        assert!(mounter.mounts().is_empty());
        assert_eq!(handle.phase(), Phase::TornDown);
        assert_eq!(
            pollster::block_on(handle.settled()),
            Err(MountError::Aborted)
        );
    }

    #[test]
    fn failed_renderer_wait_leaves_instance_inert() {
        let page = FakePage::new();
        let (renderer, _, _) = late_renderer(&page);
        let loader = Loader::new(page.clone(), Rc::new(MountContext::standalone()), renderer);
        let handle = loader.load("root", &LoaderConfig::default()).unwrap();
        page.fail_next(Fail::AwaitRenderer);

        page.fire_script_load("/main.js");

        assert_eq!(handle.phase(), Phase::Inert);
        assert_eq!(page.renderer_waiters(), 0);
        assert_eq!(
            pollster::block_on(handle.settled()),
            Err(MountError::RendererMissing)
        );
    }

    #[test]
    fn unmount_from_inside_render_stays_torn_down() {
        let page = FakePage::new();
        let mounter = CountingMounter::default();
        let slot = Rc::new(RefCell::new(None));
        let renderer = UnmountsWhileRendering {
            entry: MountEntry::new(page.clone(), mounter.clone()),
            slot: slot.clone(),
        };
        let loader = Loader::new(page.clone(), Rc::new(MountContext::standalone()), renderer);
        let handle = loader.load("root", &LoaderConfig::default()).unwrap();
        *slot.borrow_mut() = Some(loader.clone());

        assert!(page.fire_script_load("/main.js"));

        assert_eq!(handle.phase(), Phase::TornDown);
        assert_eq!(loader.phase("root"), None);
        assert_eq!(mounter.mounts().len(), 1);
        assert_eq!(mounter.teardowns(), 1);
        assert!(page.stylesheets().is_empty());
        assert!(page.scripts().is_empty());
        assert_eq!(
            pollster::block_on(handle.settled()),
            Err(MountError::Aborted)
        );
        assert_eq!(handle.unmount(), Ok(false));

        slot.borrow_mut().take();
    }

    #[test]
    fn second_load_for_live_container_is_rejected() {
        let page = FakePage::new();
        let (loader, _) = setup(&page);
        let first = loader.load("root", &LoaderConfig::default()).unwrap();
        let ops_before = page.ops().len();

        let err = loader
            .load("root", &LoaderConfig::default())
            .err()
            .unwrap();
        assert_eq!(err, MountError::AlreadyMounted("root".to_string()));
        assert_eq!(page.ops().len(), ops_before);
        assert_eq!(page.pending_scripts(), 1);

        page.fire_script_load("/main.js");
        assert!(loader.load("root", &LoaderConfig::default()).is_err());

        first.unmount().unwrap();
        assert!(loader.load("root", &LoaderConfig::default()).is_ok());
    }

    #[test]
    fn blank_container_id_is_rejected_without_side_effects() {
        let page = FakePage::new();
        let (loader, _) = setup(&page);
        for id in ["", "   "] {
            let err = loader.load(id, &LoaderConfig::default()).err().unwrap();
            assert_eq!(err, MountError::EmptyContainerId);
        }
        assert!(page.ops().is_empty());
        assert!(!loader.context().is_embedded());
    }

    #[test]
    fn script_event_after_unmount_is_ignored() {
        let page = FakePage::new();
        let (loader, mounter) = setup(&page);
        let handle = loader.load("root", &LoaderConfig::default()).unwrap();
        handle.unmount().unwrap();

        assert!(page.fire_script_load("/main.js"));

        assert!(mounter.mounts().is_empty());
        assert_eq!(handle.phase(), Phase::TornDown);
        assert_eq!(
            pollster::block_on(handle.settled()),
            Err(MountError::Aborted)
        );
    }

    #[test]
    fn stale_event_does_not_touch_a_newer_instance() {
        let page = FakePage::new();
        let (loader, mounter) = setup(&page);
        loader
            .load("root", &LoaderConfig::default())
            .unwrap()
            .unmount()
            .unwrap();
        let second = loader.load("root", &LoaderConfig::default()).unwrap();

        // The first pending callback belongs to the torn-down instance.
        assert!(page.fire_script_load("/main.js"));
        assert_eq!(second.phase(), Phase::AwaitingScript);
        assert!(mounter.mounts().is_empty());

        assert!(page.fire_script_load("/main.js"));
        assert_eq!(second.phase(), Phase::Mounted);
        assert_eq!(mounter.mounts().len(), 1);
    }

    #[test]
    fn failed_script_injection_rolls_back() {
        let page = FakePage::new();
        let (loader, _) = setup(&page);
        page.fail_next(Fail::AppendScript);

        let err = loader.load("root", &LoaderConfig::default()).err().unwrap();
        assert!(matches!(err, MountError::Host(_)));
        assert!(page.stylesheets().is_empty());
        assert!(page.scripts().is_empty());
        assert_eq!(page.count_with_id("root"), 0);
        assert_eq!(loader.phase("root"), None);

        loader.load("root", &LoaderConfig::default()).unwrap();
        assert_eq!(page.stylesheets(), vec!["/index.css".to_string()]);
    }

    #[test]
    fn rollback_tears_down_a_render_from_a_synchronous_settle() {
        let page = FakePage::new();
        let (loader, mounter) = setup(&page);
        page.fail_next(Fail::SettleThenRefuseScript);

        let err = loader.load("root", &LoaderConfig::default()).err().unwrap();

        assert!(matches!(err, MountError::Host(_)));
        assert_eq!(mounter.mounts().len(), 1);
        assert_eq!(mounter.teardowns(), 1);
        assert!(page.stylesheets().is_empty());
        assert_eq!(loader.phase("root"), None);
    }

    #[test]
    fn failed_asset_removal_still_tears_down() {
        let page = FakePage::new();
        let (loader, mounter) = setup(&page);
        let handle = loader.load("root", &LoaderConfig::default()).unwrap();
        page.fire_script_load("/main.js");
        page.fail_next(Fail::Remove);

        let err = handle.unmount().err().unwrap();

        assert!(matches!(err, MountError::Host(_)));
        assert_eq!(mounter.teardowns(), 1);
        // The stylesheet removal was refused; the script still went.
        assert_eq!(page.stylesheets(), vec!["/index.css".to_string()]);
        assert!(page.scripts().is_empty());
        assert_eq!(handle.phase(), Phase::TornDown);
        assert_eq!(loader.phase("root"), None);
        assert_eq!(handle.unmount(), Ok(false));

        let again = loader.load("root", &LoaderConfig::default()).unwrap();
        assert_eq!(again.phase(), Phase::AwaitingScript);
    }

    #[test]
    fn failed_stylesheet_injection_keeps_existing_container() {
        let page = FakePage::with_element("root");
        let (loader, _) = setup(&page);
        page.fail_next(Fail::AppendStylesheet);

        assert!(loader.load("root", &LoaderConfig::default()).is_err());
        assert_eq!(page.count_with_id("root"), 1);
        assert_eq!(loader.active_mounts(), 0);
    }

    #[test]
    fn failed_container_creation_injects_nothing() {
        let page = FakePage::new();
        let (loader, _) = setup(&page);
        page.fail_next(Fail::CreateContainer);

        assert!(loader.load("root", &LoaderConfig::default()).is_err());
        assert!(page.stylesheets().is_empty());
        assert_eq!(page.pending_scripts(), 0);
    }

    #[test]
    fn containers_mount_independently() {
        let page = FakePage::new();
        let (loader, mounter) = setup(&page);
        let a = loader.load("a", &LoaderConfig::default()).unwrap();
        let b = loader
            .load("b", &LoaderConfig::default().with_js_path("/b.js"))
            .unwrap();
        page.fire_script_load("/main.js");
        page.fire_script_load("/b.js");
        assert_eq!(loader.active_mounts(), 2);

        a.unmount().unwrap();
        assert_eq!(mounter.teardowns(), 1);
        assert_eq!(b.phase(), Phase::Mounted);
        assert_eq!(page.scripts(), vec!["/b.js".to_string()]);
    }

    #[test]
    fn dropped_loader_ignores_late_events() {
        let page = FakePage::new();
        let (loader, mounter) = setup(&page);
        let handle = loader.load("root", &LoaderConfig::default()).unwrap();
        drop(handle);
        drop(loader);

        assert!(page.fire_script_load("/main.js"));
        assert!(mounter.mounts().is_empty());
    }
}
