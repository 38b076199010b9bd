//! Loadable units: fetched assets plus the installers that turn them into
//! registered modules.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use atlas_config::FeatureConfig;
use atlas_modules::{BoxError, Dependencies};
use url::Url;

use crate::error::BootError;
use crate::runtime::Runtime;

const FETCH_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// A fetched unit asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub path: String,
    pub content_type: Option<String>,
    pub body: String,
}

pub type LoadFut<'a> = Pin<Box<dyn Future<Output = Result<Asset, BootError>> + Send + 'a>>;

/// Fetches unit assets by path.
pub trait UnitLoader: Send + Sync {
    fn fetch<'a>(&'a self, path: &'a str) -> LoadFut<'a>;
}

/// Fetches assets with a GET relative to a base URL. Any non-2xx status is a
/// failure.
#[derive(Debug, Clone)]
pub struct HttpUnitLoader {
    http: reqwest::Client,
    base: Url,
}

impl HttpUnitLoader {
    pub fn new(base_url: &str) -> Result<Self, BootError> {
        let base = Url::parse(base_url).map_err(|e| BootError::Fetch {
            path: base_url.to_string(),
            message: format!("invalid assets base URL: {e}"),
        })?;
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()
            .map_err(|e| BootError::Fetch {
                path: base_url.to_string(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { http, base })
    }

    fn resolve(&self, path: &str) -> Result<Url, BootError> {
        self.base.join(path).map_err(|e| BootError::Fetch {
            path: path.to_string(),
            message: e.to_string(),
        })
    }
}

impl UnitLoader for HttpUnitLoader {
    fn fetch<'a>(&'a self, path: &'a str) -> LoadFut<'a> {
        Box::pin(async move {
            let url = self.resolve(path)?;
            let fetch_error = |message: String| BootError::Fetch {
                path: path.to_string(),
                message,
            };

            let response = self
                .http
                .get(url.clone())
                .send()
                .await
                .map_err(|e| fetch_error(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(fetch_error(format!("HTTP {status} from {url}")));
            }

            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(String::from);
            let body = response
                .text()
                .await
                .map_err(|e| fetch_error(e.to_string()))?;

            tracing::debug!(path, url = %url, bytes = body.len(), "Fetched asset");
            Ok(Asset {
                path: path.to_string(),
                content_type,
                body,
            })
        })
    }
}

/// Turns a fetched asset into registered modules.
pub type Installer = Arc<dyn Fn(&Runtime, &Asset) -> Result<(), BoxError> + Send + Sync>;

/// One entry of the ordered core list.
#[derive(Clone)]
pub struct CoreUnit {
    pub name: String,
    pub path: String,
    installer: Installer,
}

impl CoreUnit {
    pub fn new<F>(name: impl Into<String>, path: impl Into<String>, installer: F) -> Self
    where
        F: Fn(&Runtime, &Asset) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            path: path.into(),
            installer: Arc::new(installer),
        }
    }

    pub(crate) fn install(&self, runtime: &Runtime, asset: &Asset) -> Result<(), BootError> {
        (self.installer)(runtime, asset).map_err(|source| BootError::Install {
            unit: self.name.clone(),
            source,
        })
    }
}

impl fmt::Debug for CoreUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreUnit")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Optional bundle, loaded when `selector` matches the page markup.
///
/// Its installer must register a module named `name`; that module is loaded
/// right after installation.
#[derive(Clone)]
pub struct FeatureBundle {
    pub name: String,
    pub selector: String,
    pub asset: String,
    installer: Installer,
}

impl FeatureBundle {
    pub fn new<F>(
        name: impl Into<String>,
        selector: impl Into<String>,
        asset: impl Into<String>,
        installer: F,
    ) -> Self
    where
        F: Fn(&Runtime, &Asset) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            selector: selector.into(),
            asset: asset.into(),
            installer: Arc::new(installer),
        }
    }

    /// Bundle declared in configuration. Its module instance is the fetched
    /// [`Asset`].
    #[must_use]
    pub fn from_config(feature: &FeatureConfig) -> Self {
        let name = feature.name.clone();
        Self::new(
            &feature.name,
            &feature.selector,
            &feature.asset,
            move |runtime: &Runtime, asset: &Asset| {
                let asset = asset.clone();
                runtime
                    .modules()
                    .register(name.clone(), &[], move |_: Dependencies| {
                        let asset = asset.clone();
                        async move { Ok::<_, BoxError>(asset) }
                    });
                Ok(())
            },
        )
    }

    pub(crate) fn install(&self, runtime: &Runtime, asset: &Asset) -> Result<(), BootError> {
        (self.installer)(runtime, asset).map_err(|source| BootError::Install {
            unit: self.name.clone(),
            source,
        })
    }
}

impl fmt::Debug for FeatureBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureBundle")
            .field("name", &self.name)
            .field("selector", &self.selector)
            .field("asset", &self.asset)
            .finish_non_exhaustive()
    }
}
