//! Host wrapper document: `<input>ABSOLUTE_PATH</input>`.

use std::path::PathBuf;

use crate::error::ResolveError;

/// Extract the instrument-data path from the host wrapper.
pub fn resolve(wrapper: &str) -> Result<PathBuf, ResolveError> {
    let doc = roxmltree::Document::parse(wrapper)?;
    let root = doc.root_element();
    if !root.has_tag_name("input") {
        return Err(ResolveError::UnexpectedRoot(root.tag_name().name().to_string()));
    }

    let text: String = root
        .children()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    let text = text.trim();
    if text.is_empty() {
        return Err(ResolveError::EmptyPath);
    }

    Ok(PathBuf::from(text))
}

/// Wrapper pointing at `path`, as the host would write it.
pub fn wrapper_for(path: &std::path::Path) -> String {
    let escaped = path
        .display()
        .to_string()
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!("<input>{escaped}</input>")
}
