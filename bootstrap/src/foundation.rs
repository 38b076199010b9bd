//! The foundational modules and the default core unit list.

use std::sync::Arc;

use atlas_api::ApiClient;
use atlas_modules::{BoxError, Dependencies, ModuleError};
use atlas_utils::Utils;

use crate::runtime::Runtime;
use crate::ui::{BusNotifier, Ui};
use crate::units::{Asset, CoreUnit};

pub const UTILS: &str = "utils";
pub const API: &str = "api";
pub const UI: &str = "ui";

/// Loaded, in this order, once every core unit is installed.
pub const FOUNDATIONAL: [&str; 3] = [UTILS, API, UI];

/// Core units in load order. Later units assume earlier ones are installed.
#[must_use]
pub fn default_core_units() -> Vec<CoreUnit> {
    vec![
        CoreUnit::new(UTILS, "/assets/core/utils.js", install_utils),
        CoreUnit::new(API, "/assets/core/api-client.js", install_api),
        CoreUnit::new(UI, "/assets/core/ui.js", install_ui),
    ]
}

pub fn install_utils(runtime: &Runtime, _asset: &Asset) -> Result<(), BoxError> {
    runtime
        .modules()
        .register(UTILS, &[], |_deps: Dependencies| async {
            Ok::<_, BoxError>(Utils)
        });
    Ok(())
}

pub fn install_api(runtime: &Runtime, _asset: &Asset) -> Result<(), BoxError> {
    require(runtime, API, UTILS)?;
    let bus = runtime.bus().clone();
    let config = runtime.config().clone();
    runtime
        .modules()
        .register(API, &[UTILS], move |_deps: Dependencies| {
            let client = config.api_client(bus.clone());
            async move { client.map_err(BoxError::from) }
        });
    Ok(())
}

pub fn install_ui(runtime: &Runtime, _asset: &Asset) -> Result<(), BoxError> {
    require(runtime, UI, UTILS)?;
    let bus = runtime.bus().clone();
    runtime
        .modules()
        .register(UI, &[UTILS], move |deps: Dependencies| {
            let utils = deps.get::<Utils>(UTILS).map(|utils| *utils);
            let notifier = Arc::new(BusNotifier::new(bus.clone()));
            async move { Ok::<_, BoxError>(Ui::new(notifier, utils?)) }
        });
    Ok(())
}

/// Installed units build on earlier ones; fail early when the order is wrong.
fn require(runtime: &Runtime, unit: &str, dependency: &str) -> Result<(), BoxError> {
    if runtime.modules().is_registered(dependency) {
        Ok(())
    } else {
        Err(format!("'{unit}' requires '{dependency}' to be installed first").into())
    }
}

/// Load the `api` module as its concrete client.
pub async fn api_client(runtime: &Runtime) -> Result<Arc<ApiClient>, ModuleError> {
    runtime.modules().load_as::<ApiClient>(API).await
}
