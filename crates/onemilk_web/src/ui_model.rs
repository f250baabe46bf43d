//! Route table of the storefront, available on both wasm and native.
//!
//! Keeping this out of the wasm-only `web` module allows us to unit-test the
//! base-path handling on the host.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Login,
    Home,
    Products,
    ProductDetail(String),
    Subscription,
    NotFound,
}

impl Route {
    /// Resolve a location pathname for an app mounted under `base_path`.
    ///
    /// Paths outside the base resolve to [`Route::NotFound`].
    pub fn resolve(pathname: &str, base_path: &str) -> Route {
        let Some(rest) = strip_base(pathname, base_path) else {
            return Route::NotFound;
        };
        let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] => Route::Home,
            ["login"] => Route::Login,
            ["products"] => Route::Products,
            ["products", id] => Route::ProductDetail((*id).to_string()),
            ["subscription"] => Route::Subscription,
            _ => Route::NotFound,
        }
    }

    /// Path relative to the router base.
    pub fn path(&self) -> String {
        match self {
            Route::Login => "/login".to_string(),
            Route::Home => "/".to_string(),
            Route::Products => "/products".to_string(),
            Route::ProductDetail(id) => format!("/products/{id}"),
            Route::Subscription => "/subscription".to_string(),
            Route::NotFound => "/not-found".to_string(),
        }
    }

    /// Link target that stays under the host-provided prefix.
    pub fn href(&self, base_path: &str) -> String {
        format!("{}{}", base_path.trim_end_matches('/'), self.path())
    }

    pub fn label(&self) -> &'static str {
        match self {
            Route::Login => "login",
            Route::Home => "home",
            Route::Products => "products",
            Route::ProductDetail(_) => "product_detail",
            Route::Subscription => "subscription",
            Route::NotFound => "not_found",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::Login => "Sign in",
            Route::Home => "Home",
            Route::Products => "Products",
            Route::ProductDetail(_) => "Product",
            Route::Subscription => "Subscription",
            Route::NotFound => "Page not found",
        }
    }

    pub fn requires_auth(&self) -> bool {
        !matches!(self, Route::Login | Route::NotFound)
    }

    /// Entries of the top navigation, in display order.
    pub fn nav() -> Vec<Route> {
        vec![Route::Home, Route::Products, Route::Subscription]
    }
}

/// `pathname` with `base_path` removed, if it lies under the base. The base
/// only matches on a segment boundary, so `/shopping` is not under `/shop`.
pub fn strip_base<'a>(pathname: &'a str, base_path: &str) -> Option<&'a str> {
    let base = base_path.trim_end_matches('/');
    if base.is_empty() {
        return Some(pathname);
    }
    let rest = pathname.strip_prefix(base)?;
    if rest.is_empty() || rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}
