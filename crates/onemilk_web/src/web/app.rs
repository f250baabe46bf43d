use leptos::prelude::*;

use crate::ui_model::Route;

/// Router base the app was mounted with; empty when standalone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct BasePath(pub(super) String);

/// Backend prefix published by the loader, for the data layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct ApiBase(pub(super) Option<String>);

fn current_pathname() -> String {
    web_sys::window()
        .and_then(|w| w.location().pathname().ok())
        .unwrap_or_else(|| "/".to_string())
}

#[component]
pub(super) fn App(base_path: String, api_base: Option<String>) -> impl IntoView {
    let route = Route::resolve(&current_pathname(), &base_path);
    provide_context(BasePath(base_path.clone()));
    provide_context(ApiBase(api_base));

    let nav = Route::nav()
        .into_iter()
        .map(|r| {
            let class = if r == route {
                "nav-link active"
            } else {
                "nav-link"
            };
            view! { <a class=class href=r.href(&base_path)>{r.title()}</a> }
        })
        .collect_view();

    let sign_in = route.requires_auth().then(|| {
        view! {
            <p class="subtle">
                <a href=Route::Login.href(&base_path)>"Sign in"</a>
                " to continue."
            </p>
        }
    });

    view! {
        <div class="onemilk-app" data-route=route.label()>
            <header class="onemilk-header">
                <a class="brand" href=Route::Home.href(&base_path)>"OneMilk"</a>
                <nav>{nav}</nav>
            </header>
            <main class="onemilk-main">
                <h1>{route.title()}</h1>
                {sign_in}
            </main>
        </div>
    }
}
