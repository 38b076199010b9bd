//! Page markup inspection.

use scraper::{Html, Selector};

use crate::units::FeatureBundle;

const CSRF_META: &str = r#"meta[name="csrf-token"]"#;

/// What the page markup asks for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageScan {
    pub csrf_token: Option<String>,
    /// Indices into the bundle list whose selector matched, in list order.
    pub matched: Vec<usize>,
    /// Bundles whose selector does not parse: `(index, selector)`.
    pub invalid: Vec<(usize, String)>,
}

/// Parse `html` once and test every bundle selector against it.
#[must_use]
pub fn scan_page(html: &str, bundles: &[FeatureBundle]) -> PageScan {
    let document = Html::parse_document(html);
    let mut scan = PageScan {
        csrf_token: csrf_token(&document),
        ..PageScan::default()
    };

    for (index, bundle) in bundles.iter().enumerate() {
        match Selector::parse(&bundle.selector) {
            Ok(selector) => {
                if document.select(&selector).next().is_some() {
                    scan.matched.push(index);
                }
            }
            Err(err) => {
                tracing::warn!(
                    feature = %bundle.name,
                    selector = %bundle.selector,
                    error = %err,
                    "Invalid feature selector"
                );
                scan.invalid.push((index, bundle.selector.clone()));
            }
        }
    }
    scan
}

/// Token from `<meta name="csrf-token" content="...">`, if present and non-empty.
#[must_use]
pub fn csrf_token(document: &Html) -> Option<String> {
    let selector = Selector::parse(CSRF_META).ok()?;
    document
        .select(&selector)
        .next()?
        .value()
        .attr("content")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}
