//! Loader options.
//!
//! Hosts pass these as a plain object; every key is optional and missing keys
//! fall back to the defaults below.

use serde::{Deserialize, Serialize};

use crate::error::{MountError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoaderConfig {
    /// Prefix for asset URLs and the in-app router base.
    #[serde(default)]
    pub base_path: String,
    /// Published to the page for the app's data layer; empty disables it.
    #[serde(default = "default_api_base_path")]
    pub api_base_path: String,
    #[serde(default = "default_css_path")]
    pub css_path: String,
    #[serde(default = "default_js_path")]
    pub js_path: String,
    /// Appended to the container's class list.
    #[serde(default = "default_container_class")]
    pub container_class: String,
}

fn default_api_base_path() -> String {
    "/api".to_string()
}

fn default_css_path() -> String {
    "/index.css".to_string()
}

fn default_js_path() -> String {
    "/main.js".to_string()
}

fn default_container_class() -> String {
    "onemilk-container".to_string()
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            base_path: String::new(),
            api_base_path: default_api_base_path(),
            css_path: default_css_path(),
            js_path: default_js_path(),
            container_class: default_container_class(),
        }
    }
}

impl LoaderConfig {
    /// Parse a JSON object. `null` yields the defaults.
    pub fn from_json(raw: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| MountError::Config(e.to_string()))?;
        match value {
            serde_json::Value::Null => Ok(Self::default()),
            serde_json::Value::Object(_) => {
                serde_json::from_value(value).map_err(|e| MountError::Config(e.to_string()))
            }
            other => Err(MountError::Config(format!(
                "expected an object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_api_base_path(mut self, api_base_path: impl Into<String>) -> Self {
        self.api_base_path = api_base_path.into();
        self
    }

    pub fn with_css_path(mut self, css_path: impl Into<String>) -> Self {
        self.css_path = css_path.into();
        self
    }

    pub fn with_js_path(mut self, js_path: impl Into<String>) -> Self {
        self.js_path = js_path.into();
        self
    }

    pub fn with_container_class(mut self, container_class: impl Into<String>) -> Self {
        self.container_class = container_class.into();
        self
    }

    pub fn stylesheet_href(&self) -> String {
        format!("{}{}", self.base_path, self.css_path)
    }

    pub fn script_src(&self) -> String {
        format!("{}{}", self.base_path, self.js_path)
    }

    /// The API base to publish, if any.
    pub fn api_base(&self) -> Option<&str> {
        if self.api_base_path.is_empty() {
            None
        } else {
            Some(&self.api_base_path)
        }
    }
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
