use std::rc::Rc;

use onemilk::prelude::*;
use onemilk::web_page::{WebPage, RENDERER_READY_EVENT, RENDER_FN_GLOBAL};
use tracing::{error, info};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

mod app;

use app::App;

pub fn start() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);

    let page = match WebPage::new() {
        Ok(p) => p,
        Err(e) => {
            error!("OneMilk: {}", e);
            return;
        }
    };

    // Read once: the loader sets the flag before this bundle's script is attached.
    let ctx = MountContext::observe(&page);
    let entry = Rc::new(MountEntry::new(
        page.clone(),
        LeptosMounter {
            api_base: ctx.api_base(),
        },
    ));

    match publish_render_fn(&page, entry.clone()) {
        // A loader that saw our script load before init finished is waiting for this.
        Ok(()) => {
            if let Err(e) = page.dispatch_event(RENDERER_READY_EVENT) {
                error!("OneMilk: {}", e);
            }
        }
        Err(e) => error!("OneMilk: {}", e),
    }

    if let Some(handle) = entry.bootstrap(&ctx) {
        handle.keep_alive();
    } else if !ctx.is_embedded() {
        error!("OneMilk: standalone shell has no #{}", STANDALONE_ROOT_ID);
    }
}

/// Mounts the Leptos root tree.
struct LeptosMounter {
    api_base: Option<String>,
}

impl Mounter<web_sys::Element> for LeptosMounter {
    fn mount(&self, node: &web_sys::Element, base_path: &str) -> RenderHandle {
        let parent = node.clone().unchecked_into::<web_sys::HtmlElement>();
        let base_path = base_path.to_string();
        let api_base = self.api_base.clone();
        let handle = leptos::mount::mount_to(parent, move || {
            leptos::view! { <App base_path=base_path api_base=api_base /> }
        });
        // Dropping the leptos handle unmounts the tree.
        RenderHandle::new(move || drop(handle))
    }
}

/// `window.renderOneMilk(containerId, basePath?)`: returns an unmount function,
/// or `undefined` when the container does not exist.
fn publish_render_fn(page: &WebPage, renderer: Rc<dyn Renderer>) -> Result<()> {
    let render = Closure::wrap(Box::new(move |container_id: JsValue, base_path: JsValue| {
        let Some(container_id) = container_id.as_string() else {
            return JsValue::UNDEFINED;
        };
        let base_path = base_path.as_string().unwrap_or_default();
        let Some(handle) = renderer.render(&container_id, &base_path) else {
            return JsValue::UNDEFINED;
        };
        info!("OneMilk: rendered into #{}", container_id);

        let mut handle = Some(handle);
        Closure::wrap(Box::new(move || {
            if let Some(h) = handle.take() {
                h.unmount();
            }
        }) as Box<dyn FnMut()>)
        .into_js_value()
    }) as Box<dyn FnMut(JsValue, JsValue) -> JsValue>);

    page.set_global(RENDER_FN_GLOBAL, render.as_ref())?;
    render.forget();
    Ok(())
}
