//! Rendering of askama view models, and the positional slot used by page
//! title and href patterns.

use askama::Template;

use crate::error::TemplateError;

/// Render a view model into markup.
pub fn render<T: Template>(view: &T) -> Result<String, TemplateError> {
    view.render().map_err(|source| TemplateError::Render {
        view: std::any::type_name::<T>(),
        source,
    })
}

/// Fill the single positional `{}` slot of a title or href pattern.
pub fn fill(pattern: &str, value: &str) -> String {
    pattern.replacen("{}", value, 1)
}
