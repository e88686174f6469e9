//! Boot document for the isolated preview frame.
//!
//! The document mounts nothing by itself: it defines the globals the runtime
//! bundle reads, then loads the runtime bundle followed by the user bundle.

use std::fmt::Write as _;

use serde::Serialize;

/// Runtime bundle; always loaded before the user bundle.
pub const CLIENT_BUNDLE: &str = "client-bundle.js";
/// Bundle with the user's components.
pub const USER_BUNDLE: &str = "user-bundle.js";
/// Global the runtime bundle installs once the component is mounted; called
/// with new props to re-render in place.
pub const UPDATE_ENTRY: &str = "UPDATE_COMPONENT";

/// Extra payloads from the user's configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserFiles {
    /// Inline stylesheets.
    pub styles: Vec<String>,
    /// Inline scripts, executed in order.
    pub scripts: Vec<String>,
}

/// Builder for the preview boot document.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewDocument {
    plugin: String,
    component_path: String,
    bundle_dir: Option<String>,
    inject_tags: Vec<String>,
    user_files: UserFiles,
    initial_data: Option<serde_json::Value>,
}

impl PreviewDocument {
    /// Document for `component_path` rendered by `plugin`.
    pub fn new(plugin: impl Into<String>, component_path: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            component_path: component_path.into(),
            bundle_dir: None,
            inject_tags: Vec::new(),
            user_files: UserFiles::default(),
            initial_data: None,
        }
    }

    /// Serves bundles from `/<dir>/` instead of relative URLs.
    #[must_use]
    pub fn bundle_dir(mut self, dir: impl Into<String>) -> Self {
        let dir = dir.into();
        let dir = dir.trim_matches('/');
        self.bundle_dir = (!dir.is_empty()).then(|| dir.to_string());
        self
    }

    /// Raw tags inserted after the globals script.
    #[must_use]
    pub fn inject_tags(mut self, tags: Vec<String>) -> Self {
        self.inject_tags = tags;
        self
    }

    /// Inline styles and scripts from the library configuration.
    #[must_use]
    pub fn user_files(mut self, files: UserFiles) -> Self {
        self.user_files = files;
        self
    }

    /// Inlines `INITIAL_COMPONENT_DATA`; hosts that can reach the frame
    /// window set it after writing the document instead.
    #[must_use]
    pub fn initial_data(mut self, props: serde_json::Value) -> Self {
        self.initial_data = Some(props);
        self
    }

    /// URL of `bundle` honoring the bundle directory.
    #[must_use]
    pub fn bundle_url(&self, bundle: &str) -> String {
        match &self.bundle_dir {
            Some(dir) => format!("/{dir}/{bundle}"),
            None => bundle.to_string(),
        }
    }

    /// Renders the full HTML document.
    #[must_use]
    pub fn render(&self) -> String {
        let mut html = String::with_capacity(1024);
        html.push_str("<!DOCTYPE html>\n");
        html.push_str("<html style=\"height: 100%; width: 100%; margin: 0; padding: 0;\">\n");
        html.push_str("<body style=\"height: 100%; width: 100%; margin: 0; padding: 0;\">\n");
        html.push_str(
            "<div id=\"root\" style=\"display: flex; justify-content: center; align-items: center;\"></div>\n",
        );
        html.push_str("<script>\n");
        let _ = writeln!(html, "window.PLUGIN_NAME = {};", script_json(&self.plugin));
        let _ = writeln!(
            html,
            "window.COMPONENT_PATH = {};",
            script_json(&self.component_path)
        );
        html.push_str("window.COMPONENT_DATA = undefined;\n");
        if let Some(data) = &self.initial_data {
            let _ = writeln!(html, "window.INITIAL_COMPONENT_DATA = {};", script_json(data));
        }
        html.push_str("</script>\n");
        for tag in &self.inject_tags {
            html.push_str(tag);
            html.push('\n');
        }
        for style in &self.user_files.styles {
            let _ = writeln!(html, "<style>\n{style}\n</style>");
        }
        for script in &self.user_files.scripts {
            let _ = writeln!(html, "<script>\n{script}\n</script>");
        }
        for bundle in [CLIENT_BUNDLE, USER_BUNDLE] {
            let _ = writeln!(html, "<script src=\"{}\"></script>", self.bundle_url(bundle));
        }
        html.push_str("</body>\n</html>\n");
        html
    }
}

/// JSON safe to embed inside an inline `<script>` element.
#[must_use]
pub fn script_json<T: Serialize + ?Sized>(value: &T) -> String {
    let json = serde_json::to_string(value).unwrap_or_else(|_| "null".to_string());
    let mut escaped = String::with_capacity(json.len());
    for ch in json.chars() {
        match ch {
            '<' => escaped.push_str("\\u003c"),
            '>' => escaped.push_str("\\u003e"),
            '&' => escaped.push_str("\\u0026"),
            '\u{2028}' => escaped.push_str("\\u2028"),
            '\u{2029}' => escaped.push_str("\\u2029"),
            other => escaped.push(other),
        }
    }
    escaped
}
