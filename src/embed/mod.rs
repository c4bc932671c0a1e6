//! Embedded static resources.
//!
//! - `serve` - Dev server resources (livereload.js)
//!
//! Placeholders in embedded files look like `__KILN_NAME__` and are filled
//! from a typed variable set, so a template can only be rendered with the
//! values it declares.
//!
//! ```ignore
//! use embed::serve::{LIVERELOAD_JS, LivereloadVars};
//! let js = LIVERELOAD_JS.render(&LivereloadVars { ws_port: 35729 });
//! ```

use std::marker::PhantomData;

/// Values substituted into a [`Template`].
pub trait TemplateVars {
    /// `(placeholder, value)` pairs.
    fn placeholders(&self) -> Vec<(&'static str, String)>;
}

/// An embedded file with typed placeholders.
#[derive(Debug, Clone, Copy)]
pub struct Template<V> {
    content: &'static str,
    _vars: PhantomData<fn(&V)>,
}

impl<V: TemplateVars> Template<V> {
    pub const fn new(content: &'static str) -> Self {
        Self {
            content,
            _vars: PhantomData,
        }
    }

    pub fn render(&self, vars: &V) -> String {
        vars.placeholders()
            .into_iter()
            .fold(self.content.to_string(), |acc, (key, value)| acc.replace(key, &value))
    }
}

pub mod serve {
    use super::{Template, TemplateVars};

    /// Variables for livereload.js.
    pub struct LivereloadVars {
        pub ws_port: u16,
    }

    impl TemplateVars for LivereloadVars {
        fn placeholders(&self) -> Vec<(&'static str, String)> {
            vec![("__KILN_WS_PORT__", self.ws_port.to_string())]
        }
    }

    /// Live-reload client injected into served HTML.
    pub const LIVERELOAD_JS: Template<LivereloadVars> =
        Template::new(include_str!("serve/livereload.js"));
}

#[cfg(test)]
mod tests {
    use super::serve::*;

    #[test]
    fn test_livereload_js_with_port() {
        let js = LIVERELOAD_JS.render(&LivereloadVars { ws_port: 35729 });
        assert!(js.contains("var port = 35729;"));
        assert!(!js.contains("__KILN_WS_PORT__"));
        assert!(js.contains("clear_error"));
    }
}
