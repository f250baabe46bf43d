use std::rc::Rc;

use onemilk::prelude::*;
use onemilk::web_page::{GlobalRenderFn, WebPage, NAMESPACE_GLOBAL};
use tracing::{error, warn};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

type JsResult<T> = std::result::Result<T, JsValue>;

pub fn start() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);

    if let Err(e) = install() {
        error!("OneMilk loader: {}", e);
    }
}

/// Put `load` on `window.OneMilk`, keeping whatever else the host already
/// stored there.
fn install() -> Result<()> {
    let page = WebPage::new()?;
    let loader = Loader::new(
        page.clone(),
        Rc::new(MountContext::standalone()),
        GlobalRenderFn::new(page.clone()),
    );

    let namespace = match page.global(NAMESPACE_GLOBAL) {
        Some(v) if v.is_object() => v.unchecked_into::<js_sys::Object>(),
        _ => js_sys::Object::new(),
    };

    let load = Closure::wrap(Box::new(
        move |container_id: JsValue, config: JsValue| -> JsResult<JsValue> {
            let container_id = container_id.as_string().unwrap_or_default();
            let config = parse_config(&config)?;
            let handle = loader.load(&container_id, &config)?;
            Ok(unmount_function(handle))
        },
    ) as Box<dyn FnMut(JsValue, JsValue) -> JsResult<JsValue>>);

    js_sys::Reflect::set(&namespace, &JsValue::from_str("load"), load.as_ref())
        .map_err(|_| MountError::host("OneMilk: failed to set load"))?;
    load.forget();
    page.set_global(NAMESPACE_GLOBAL, &namespace)
}

fn parse_config(v: &JsValue) -> Result<LoaderConfig> {
    if v.is_undefined() || v.is_null() {
        return Ok(LoaderConfig::default());
    }
    let raw: String = js_sys::JSON::stringify(v)
        .map_err(|_| MountError::Config("config is not serializable".to_string()))?
        .into();
    LoaderConfig::from_json(&raw)
}

/// The host's unmount function. Its `ready` property is a Promise that
/// resolves once the app mounted and rejects with the reason it did not.
fn unmount_function(handle: MountHandle<WebPage>) -> JsValue {
    let settled = handle.settled();
    let ready = wasm_bindgen_futures::future_to_promise(async move {
        settled
            .await
            .map(|()| JsValue::UNDEFINED)
            .map_err(JsValue::from)
    });

    let unmount = Closure::wrap(Box::new(move || {
        if let Err(e) = handle.unmount() {
            warn!("OneMilk: unmount of #{}: {}", handle.container_id(), e);
        }
    }) as Box<dyn FnMut()>)
    .into_js_value();

    if js_sys::Reflect::set(&unmount, &JsValue::from_str("ready"), &ready).is_err() {
        warn!("OneMilk: could not attach ready promise");
    }
    unmount
}
