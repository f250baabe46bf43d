//! Browser page adapter and the page-global contract shared by the loader and
//! application bundles.
//!
//! Enable with the `web` feature flag (wasm32 only).

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::warn;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::error::{MountError, Result};
use crate::host::{HostPage, ScriptCallback};
use crate::render::{RenderHandle, Renderer};

/// `(containerId, basePath?) => (() => void) | undefined`, published by the
/// application bundle.
pub const RENDER_FN_GLOBAL: &str = "renderOneMilk";
pub const EMBEDDED_FLAG_GLOBAL: &str = "isInMicroFrontendContainer";
pub const API_BASE_GLOBAL: &str = "VITE_API_BASE_URL";
/// Namespace object holding `load`, installed by the loader bundle.
pub const NAMESPACE_GLOBAL: &str = "OneMilk";
/// Dispatched on `window` by the application bundle once `renderOneMilk` is
/// published. Wasm bundles initialise after their module script's load event.
pub const RENDERER_READY_EVENT: &str = "onemilk:ready";
/// How long a loaded script may take to announce its render function.
pub const RENDERER_WAIT_MS: i32 = 10_000;

impl From<MountError> for JsValue {
    fn from(e: MountError) -> Self {
        js_sys::Error::new(&e.to_string()).into()
    }
}

#[derive(Clone)]
pub struct WebPage {
    window: web_sys::Window,
    document: web_sys::Document,
}

impl WebPage {
    pub fn new() -> Result<Self> {
        let window = web_sys::window().ok_or_else(|| MountError::host("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| MountError::host("no document"))?;
        Ok(Self { window, document })
    }

    pub fn global(&self, name: &str) -> Option<JsValue> {
        js_sys::Reflect::get(&self.window, &JsValue::from_str(name))
            .ok()
            .filter(|v| !v.is_undefined() && !v.is_null())
    }

    pub fn set_global(&self, name: &str, value: &JsValue) -> Result<()> {
        js_sys::Reflect::set(&self.window, &JsValue::from_str(name), value)
            .map(|_| ())
            .map_err(|_| MountError::host(format!("window: failed to set {name}")))
    }

    pub fn dispatch_event(&self, name: &str) -> Result<()> {
        let event = web_sys::Event::new(name)
            .map_err(|_| MountError::host(format!("event: cannot create {name}")))?;
        self.window
            .dispatch_event(&event)
            .map(|_| ())
            .map_err(|_| MountError::host(format!("window: dispatch of {name} failed")))
    }

    fn body(&self) -> Result<web_sys::HtmlElement> {
        self.document
            .body()
            .ok_or_else(|| MountError::host("document: no body"))
    }

    fn create(&self, tag: &str) -> Result<web_sys::Element> {
        self.document
            .create_element(tag)
            .map_err(|_| MountError::host(format!("document: create_element({tag}) failed")))
    }
}

impl HostPage for WebPage {
    type Node = web_sys::Element;

    fn element_by_id(&self, id: &str) -> Option<web_sys::Element> {
        self.document.get_element_by_id(id)
    }

    fn create_container(&self, id: &str) -> Result<web_sys::Element> {
        let el = self.create("div")?;
        el.set_id(id);
        self.body()?
            .append_child(&el)
            .map_err(|_| MountError::host("body: append_child failed"))?;
        Ok(el)
    }

    fn add_class(&self, node: &web_sys::Element, class: &str) -> Result<()> {
        node.class_list()
            .add_1(class)
            .map_err(|_| MountError::host(format!("class_list: invalid class `{class}`")))
    }

    fn embedding_flag(&self) -> bool {
        self.global(EMBEDDED_FLAG_GLOBAL)
            .map(|v| v.is_truthy())
            .unwrap_or(false)
    }

    fn set_embedding_flag(&self, embedded: bool) -> Result<()> {
        self.set_global(EMBEDDED_FLAG_GLOBAL, &JsValue::from_bool(embedded))
    }

    fn api_base(&self) -> Option<String> {
        self.global(API_BASE_GLOBAL).and_then(|v| v.as_string())
    }

    fn set_api_base(&self, base: &str) -> Result<()> {
        self.set_global(API_BASE_GLOBAL, &JsValue::from_str(base))
    }

    fn append_stylesheet(&self, href: &str) -> Result<web_sys::Element> {
        let link = self
            .create("link")?
            .dyn_into::<web_sys::HtmlLinkElement>()
            .map_err(|_| MountError::host("document: link cast failed"))?;
        link.set_rel("stylesheet");
        link.set_href(href);
        let head = self
            .document
            .head()
            .ok_or_else(|| MountError::host("document: no head"))?;
        head.append_child(&link)
            .map_err(|_| MountError::host("head: append_child failed"))?;
        Ok(link.into())
    }

    fn append_script(&self, src: &str, on_settle: ScriptCallback) -> Result<web_sys::Element> {
        let script = self
            .create("script")?
            .dyn_into::<web_sys::HtmlScriptElement>()
            .map_err(|_| MountError::host("document: script cast failed"))?;
        script.set_type("module");
        script.set_src(src);

        // load and error are exclusive, but either may be the one that fires.
        let pending = Rc::new(RefCell::new(Some(on_settle)));

        let pending_ok = pending.clone();
        let script_ok = script.clone();
        let onload = Closure::wrap(Box::new(move |_ev: web_sys::Event| {
            clear_handlers(&script_ok);
            let cb = pending_ok.borrow_mut().take();
            if let Some(cb) = cb {
                cb(Ok(()));
            }
        }) as Box<dyn FnMut(_)>);
        script.set_onload(Some(onload.as_ref().unchecked_ref()));
        onload.forget();

        let pending_err = pending;
        let script_err = script.clone();
        let src_err = src.to_string();
        let onerror = Closure::wrap(Box::new(move |_ev: web_sys::Event| {
            clear_handlers(&script_err);
            let cb = pending_err.borrow_mut().take();
            if let Some(cb) = cb {
                cb(Err(format!("network or script error fetching {src_err}")));
            }
        }) as Box<dyn FnMut(_)>);
        script.set_onerror(Some(onerror.as_ref().unchecked_ref()));
        onerror.forget();

        self.body()?
            .append_child(&script)
            .map_err(|_| MountError::host("body: append_child failed"))?;
        Ok(script.into())
    }

    fn await_renderer(&self, on_ready: ScriptCallback) -> Result<()> {
        // The ready event and the timeout race; whichever runs first settles.
        let pending = Rc::new(RefCell::new(Some(on_ready)));
        let timeout = Rc::new(Cell::new(None::<i32>));

        let pending_ready = pending.clone();
        let timeout_ready = timeout.clone();
        let window = self.window.clone();
        let onready = Closure::wrap(Box::new(move |_ev: web_sys::Event| {
            if let Some(handle) = timeout_ready.take() {
                window.clear_timeout_with_handle(handle);
            }
            let cb = pending_ready.borrow_mut().take();
            if let Some(cb) = cb {
                cb(Ok(()));
            }
        }) as Box<dyn FnMut(_)>);
        self.window
            .add_event_listener_with_callback(
                RENDERER_READY_EVENT,
                onready.as_ref().unchecked_ref(),
            )
            .map_err(|_| MountError::host("window: add_event_listener failed"))?;
        onready.forget();

        let ontimeout = Closure::wrap(Box::new(move || {
            let cb = pending.borrow_mut().take();
            if let Some(cb) = cb {
                cb(Err(format!("no {RENDERER_READY_EVENT} within {RENDERER_WAIT_MS} ms")));
            }
        }) as Box<dyn FnMut()>);
        let handle = self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                ontimeout.as_ref().unchecked_ref(),
                RENDERER_WAIT_MS,
            )
            .map_err(|_| MountError::host("window: set_timeout failed"))?;
        ontimeout.forget();
        timeout.set(Some(handle));
        Ok(())
    }

    fn remove(&self, node: &web_sys::Element) -> Result<()> {
        node.remove();
        Ok(())
    }
}

fn clear_handlers(script: &web_sys::HtmlScriptElement) {
    script.set_onload(None);
    script.set_onerror(None);
}

/// Renderer that calls the `renderOneMilk` function another bundle published
/// on the page.
#[derive(Clone)]
pub struct GlobalRenderFn {
    page: WebPage,
}

impl GlobalRenderFn {
    pub fn new(page: WebPage) -> Self {
        Self { page }
    }

    fn function(&self) -> Option<js_sys::Function> {
        self.page
            .global(RENDER_FN_GLOBAL)
            .and_then(|v| v.dyn_into::<js_sys::Function>().ok())
    }
}

impl Renderer for GlobalRenderFn {
    fn render(&self, container_id: &str, base_path: &str) -> Option<RenderHandle> {
        let f = self.function()?;
        let ret = match f.call2(
            &JsValue::UNDEFINED,
            &JsValue::from_str(container_id),
            &JsValue::from_str(base_path),
        ) {
            Ok(v) => v,
            Err(e) => {
                warn!("{} threw: {:?}", RENDER_FN_GLOBAL, e);
                return None;
            }
        };
        let teardown = ret.dyn_into::<js_sys::Function>().ok()?;
        Some(RenderHandle::new(move || {
            if let Err(e) = teardown.call0(&JsValue::UNDEFINED) {
                warn!("unmount function threw: {:?}", e);
            }
        }))
    }

    fn is_available(&self) -> bool {
        self.function().is_some()
    }
}
