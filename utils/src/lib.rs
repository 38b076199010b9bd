//! Shared utilities for Atlas.
//!
//! - **`escape`**: HTML escaping for untrusted text
//! - **`debounce`**: trailing-edge debouncing on the tokio runtime
//!
//! [`Utils`] bundles both; it is the instance behind the `utils` module and
//! the capability set left standing in fallback mode.

mod debounce;
mod escape;

use std::borrow::Cow;
use std::time::Duration;

pub use debounce::Debouncer;
pub use escape::escape_html;

#[derive(Debug, Clone, Copy, Default)]
pub struct Utils;

impl Utils {
    #[must_use]
    pub fn escape_html<'a>(&self, input: &'a str) -> Cow<'a, str> {
        escape_html(input)
    }

    #[must_use]
    pub fn debouncer(&self, delay: Duration) -> Debouncer {
        Debouncer::new(delay)
    }
}
