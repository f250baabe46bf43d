//! In-memory page for lifecycle tests.
//!
//! Records every mutating call in order, keeps script and renderer-ready
//! callbacks pending until a test fires them, and can be told to fail the next
//! call of a given kind.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::entry::Mounter;
use crate::error::{MountError, Result};
use crate::host::{HostPage, ScriptCallback};
use crate::render::RenderHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Op {
    SetEmbedded(bool),
    CreateContainer(String),
    AddClass(String),
    SetApiBase(String),
    AppendStylesheet(String),
    AppendScript(String),
    Remove(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fail {
    CreateContainer,
    AppendStylesheet,
    AppendScript,
    /// Settle the script as loaded inside `append_script`, then report failure.
    SettleThenRefuseScript,
    AwaitRenderer,
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Parent {
    Head,
    Body,
}

#[derive(Debug)]
struct FakeNode {
    tag: &'static str,
    id: Option<String>,
    classes: Vec<String>,
    url: Option<String>,
    parent: Option<Parent>,
}

#[derive(Default)]
struct State {
    nodes: Vec<FakeNode>,
    ops: Vec<Op>,
    embedded: bool,
    api_base: Option<String>,
    pending: Vec<(String, ScriptCallback)>,
    renderer_waiters: Vec<ScriptCallback>,
    fail: Option<Fail>,
}

#[derive(Clone, Default)]
pub(crate) struct FakePage {
    state: Rc<RefCell<State>>,
}

impl FakePage {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// A page whose body already holds `<div id={id}>`.
    pub(crate) fn with_element(id: &str) -> Self {
        let page = Self::new();
        page.push_node("div", Some(id.to_string()), None, Parent::Body);
        page
    }

    fn push_node(
        &self,
        tag: &'static str,
        id: Option<String>,
        url: Option<String>,
        parent: Parent,
    ) -> NodeId {
        let mut st = self.state.borrow_mut();
        st.nodes.push(FakeNode {
            tag,
            id,
            classes: Vec::new(),
            url,
            parent: Some(parent),
        });
        NodeId(st.nodes.len() - 1)
    }

    fn take_fail(&self, kind: Fail) -> Result<()> {
        let mut st = self.state.borrow_mut();
        if st.fail == Some(kind) {
            st.fail = None;
            return Err(MountError::host(format!("{kind:?} refused")));
        }
        Ok(())
    }

    pub(crate) fn fail_next(&self, kind: Fail) {
        self.state.borrow_mut().fail = Some(kind);
    }

    pub(crate) fn ops(&self) -> Vec<Op> {
        self.state.borrow().ops.clone()
    }

    pub(crate) fn count_with_id(&self, id: &str) -> usize {
        self.state
            .borrow()
            .nodes
            .iter()
            .filter(|n| n.parent.is_some() && n.id.as_deref() == Some(id))
            .count()
    }

    pub(crate) fn classes_of(&self, id: &str) -> Vec<String> {
        self.state
            .borrow()
            .nodes
            .iter()
            .find(|n| n.parent.is_some() && n.id.as_deref() == Some(id))
            .map(|n| n.classes.clone())
            .unwrap_or_default()
    }

    fn attached_urls(&self, tag: &str, parent: Parent) -> Vec<String> {
        self.state
            .borrow()
            .nodes
            .iter()
            .filter(|n| n.tag == tag && n.parent == Some(parent))
            .filter_map(|n| n.url.clone())
            .collect()
    }

    pub(crate) fn stylesheets(&self) -> Vec<String> {
        self.attached_urls("link", Parent::Head)
    }

    pub(crate) fn scripts(&self) -> Vec<String> {
        self.attached_urls("script", Parent::Body)
    }

    /// Detach an element behind the loader's back, as a host page might.
    pub(crate) fn detach_by_id(&self, id: &str) {
        let mut st = self.state.borrow_mut();
        for n in st.nodes.iter_mut() {
            if n.id.as_deref() == Some(id) {
                n.parent = None;
            }
        }
    }

    pub(crate) fn pending_scripts(&self) -> usize {
        self.state.borrow().pending.len()
    }

    /// Fire the load event of the first pending script with this src.
    pub(crate) fn fire_script_load(&self, src: &str) -> bool {
        self.fire(src, Ok(()))
    }

    pub(crate) fn fire_script_error(&self, src: &str, reason: &str) -> bool {
        self.fire(src, Err(reason.to_string()))
    }

    fn fire(&self, src: &str, outcome: crate::host::ScriptSettle) -> bool {
        let cb = {
            let mut st = self.state.borrow_mut();
            match st.pending.iter().position(|(s, _)| s == src) {
                Some(i) => st.pending.remove(i).1,
                None => return false,
            }
        };
        cb(outcome);
        true
    }

    pub(crate) fn renderer_waiters(&self) -> usize {
        self.state.borrow().renderer_waiters.len()
    }

    /// Tell every waiter the render function is published. Returns how many
    /// were waiting.
    pub(crate) fn announce_renderer(&self) -> usize {
        self.release_renderer_waiters(Ok(()))
    }

    pub(crate) fn expire_renderer_waits(&self, reason: &str) -> usize {
        self.release_renderer_waiters(Err(reason.to_string()))
    }

    fn release_renderer_waiters(&self, outcome: crate::host::ScriptSettle) -> usize {
        let waiters = std::mem::take(&mut self.state.borrow_mut().renderer_waiters);
        let n = waiters.len();
        for cb in waiters {
            cb(outcome.clone());
        }
        n
    }
}

impl HostPage for FakePage {
    type Node = NodeId;

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.state
            .borrow()
            .nodes
            .iter()
            .position(|n| n.parent.is_some() && n.id.as_deref() == Some(id))
            .map(NodeId)
    }

    fn create_container(&self, id: &str) -> Result<NodeId> {
        self.take_fail(Fail::CreateContainer)?;
        self.state
            .borrow_mut()
            .ops
            .push(Op::CreateContainer(id.to_string()));
        Ok(self.push_node("div", Some(id.to_string()), None, Parent::Body))
    }

    fn add_class(&self, node: &NodeId, class: &str) -> Result<()> {
        let mut st = self.state.borrow_mut();
        st.ops.push(Op::AddClass(class.to_string()));
        let n = st
            .nodes
            .get_mut(node.0)
            .ok_or_else(|| MountError::host("unknown node"))?;
        if !n.classes.iter().any(|c| c == class) {
            n.classes.push(class.to_string());
        }
        Ok(())
    }

    fn embedding_flag(&self) -> bool {
        self.state.borrow().embedded
    }

    fn set_embedding_flag(&self, embedded: bool) -> Result<()> {
        let mut st = self.state.borrow_mut();
        st.ops.push(Op::SetEmbedded(embedded));
        st.embedded = embedded;
        Ok(())
    }

    fn api_base(&self) -> Option<String> {
        self.state.borrow().api_base.clone()
    }

    fn set_api_base(&self, base: &str) -> Result<()> {
        let mut st = self.state.borrow_mut();
        st.ops.push(Op::SetApiBase(base.to_string()));
        st.api_base = Some(base.to_string());
        Ok(())
    }

    fn append_stylesheet(&self, href: &str) -> Result<NodeId> {
        self.take_fail(Fail::AppendStylesheet)?;
        self.state
            .borrow_mut()
            .ops
            .push(Op::AppendStylesheet(href.to_string()));
        Ok(self.push_node("link", None, Some(href.to_string()), Parent::Head))
    }

    fn append_script(&self, src: &str, on_settle: ScriptCallback) -> Result<NodeId> {
        self.take_fail(Fail::AppendScript)?;
        if let Err(e) = self.take_fail(Fail::SettleThenRefuseScript) {
            on_settle(Ok(()));
            return Err(e);
        }
        {
            let mut st = self.state.borrow_mut();
            st.ops.push(Op::AppendScript(src.to_string()));
            st.pending.push((src.to_string(), on_settle));
        }
        Ok(self.push_node("script", None, Some(src.to_string()), Parent::Body))
    }

    fn await_renderer(&self, on_ready: ScriptCallback) -> Result<()> {
        self.take_fail(Fail::AwaitRenderer)?;
        self.state.borrow_mut().renderer_waiters.push(on_ready);
        Ok(())
    }

    fn remove(&self, node: &NodeId) -> Result<()> {
        self.take_fail(Fail::Remove)?;
        let mut st = self.state.borrow_mut();
        st.ops.push(Op::Remove(*node));
        let n = st
            .nodes
            .get_mut(node.0)
            .ok_or_else(|| MountError::host("unknown node"))?;
        if n.parent.take().is_none() {
            return Err(MountError::host("node is not attached"));
        }
        Ok(())
    }
}

/// Records every mount and counts teardowns.
#[derive(Clone, Default)]
pub(crate) struct CountingMounter {
    mounts: Rc<RefCell<Vec<(NodeId, String)>>>,
    teardowns: Rc<Cell<u32>>,
}

impl CountingMounter {
    pub(crate) fn mounts(&self) -> Vec<(NodeId, String)> {
        self.mounts.borrow().clone()
    }

    pub(crate) fn teardowns(&self) -> u32 {
        self.teardowns.get()
    }
}

impl Mounter<NodeId> for CountingMounter {
    fn mount(&self, node: &NodeId, base_path: &str) -> RenderHandle {
        self.mounts.borrow_mut().push((*node, base_path.to_string()));
        let teardowns = self.teardowns.clone();
        RenderHandle::new(move || teardowns.set(teardowns.get() + 1))
    }
}
