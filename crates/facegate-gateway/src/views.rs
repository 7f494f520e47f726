//! File-backed HTML templates with `{{ name }}` placeholders.

use std::path::{Path, PathBuf};

use facegate_types::{FacegateError, Result};
use tracing::debug;

pub const FACE_TEMPLATE: &str = "face.html";

pub struct TemplateViews {
    dir: PathBuf,
}

impl TemplateViews {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reads `name` from disk on every call so edited templates show up
    /// without a restart. Values are HTML-escaped before substitution.
    pub async fn render(&self, name: &str, values: &[(&str, &str)]) -> Result<String> {
        let path = self.dir.join(name);
        let mut page = tokio::fs::read_to_string(&path)
            .await
            .map_err(|err| render_error(format!("cannot read template {}: {err}", path.display())))?;
        for (key, value) in values {
            page = page.replace(&format!("{{{{ {key} }}}}"), &escape_html(value));
        }
        debug!("Rendered {}", path.display());
        Ok(page)
    }

    pub async fn face(&self, user: &str) -> Result<String> {
        self.render(FACE_TEMPLATE, &[("user", user)]).await
    }
}

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    escaped
}

pub fn render_error(message: impl Into<String>) -> FacegateError {
    FacegateError::Render(message.into())
}
