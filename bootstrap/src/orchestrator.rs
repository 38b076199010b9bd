use std::sync::Arc;

use atlas_types::Event;
use atlas_utils::Utils;
use serde::Serialize;

use crate::error::BootError;
use crate::foundation::{FOUNDATIONAL, UI, UTILS, default_core_units};
use crate::page::{PageScan, scan_page};
use crate::runtime::Runtime;
use crate::state::BootState;
use crate::ui::Ui;
use crate::units::{CoreUnit, FeatureBundle, UnitLoader};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureFailure {
    pub feature: String,
    pub error: String,
}

/// Outcome of one boot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BootReport {
    pub state: BootState,
    /// Core units installed, in load order.
    pub core_units: Vec<String>,
    /// Foundational modules loaded.
    pub modules: Vec<String>,
    pub features_loaded: Vec<String>,
    pub features_failed: Vec<FeatureFailure>,
    pub fallback_reason: Option<String>,
    pub csrf_token_found: bool,
}

impl BootReport {
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.state == BootState::Fallback
    }
}

/// Drives a [`Runtime`] through the boot sequence.
///
/// Core units load strictly in order and any failure sends the runtime to
/// [`BootState::Fallback`]. Feature bundles are independent: one failing is
/// logged, announced and skipped.
pub struct Orchestrator {
    runtime: Runtime,
    loader: Arc<dyn UnitLoader>,
    core_units: Vec<CoreUnit>,
    features: Vec<FeatureBundle>,
    state: BootState,
}

impl Orchestrator {
    /// Orchestrator with the default core units and no feature bundles.
    pub fn new(runtime: Runtime, loader: Arc<dyn UnitLoader>) -> Self {
        Self {
            runtime,
            loader,
            core_units: default_core_units(),
            features: Vec::new(),
            state: BootState::Uninitialized,
        }
    }

    pub fn with_core_units(mut self, units: Vec<CoreUnit>) -> Self {
        self.core_units = units;
        self
    }

    pub fn with_feature(mut self, bundle: FeatureBundle) -> Self {
        self.features.push(bundle);
        self
    }

    pub fn with_features(mut self, bundles: impl IntoIterator<Item = FeatureBundle>) -> Self {
        self.features.extend(bundles);
        self
    }

    #[must_use]
    pub fn state(&self) -> BootState {
        self.state
    }

    #[must_use]
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Run the boot sequence against the page markup.
    ///
    /// Only a second call fails; every other failure ends in a report with
    /// state [`BootState::Fallback`].
    pub async fn boot(&mut self, page: &str) -> Result<BootReport, BootError> {
        let scan = scan_page(page, &self.features);
        let mut report = BootReport {
            csrf_token_found: scan.csrf_token.is_some(),
            ..BootReport::default()
        };
        if let Some(token) = &scan.csrf_token {
            self.runtime.config().set_csrf_token(token.clone());
        }

        self.state.advance(BootState::LoadingCore)?;
        if let Err(err) = self.load_core(&mut report).await {
            return self.fall_back(report, &err);
        }

        self.state.advance(BootState::ModulesReady)?;
        if let Err(err) = self.init_modules(&mut report).await {
            return self.fall_back(report, &err);
        }

        self.state.advance(BootState::FeaturesReady)?;
        self.load_features(&scan, &mut report).await;

        report.state = self.state;
        tracing::info!(
            core_units = report.core_units.len(),
            features_loaded = report.features_loaded.len(),
            features_failed = report.features_failed.len(),
            "Runtime booted"
        );
        Ok(report)
    }

    async fn load_core(&self, report: &mut BootReport) -> Result<(), BootError> {
        for unit in &self.core_units {
            let asset = self.loader.fetch(&unit.path).await?;
            unit.install(&self.runtime, &asset)?;
            tracing::debug!(unit = %unit.name, path = %unit.path, "Core unit installed");
            report.core_units.push(unit.name.clone());
        }
        Ok(())
    }

    async fn init_modules(&self, report: &mut BootReport) -> Result<(), BootError> {
        self.runtime.modules().load_all(&FOUNDATIONAL).await?;

        let config = self.runtime.config();
        config.merge_defaults();
        self.runtime.bus().set_debug(config.snapshot().debug());

        let modules: Vec<String> = FOUNDATIONAL.iter().map(ToString::to_string).collect();
        report.modules.clone_from(&modules);
        self.runtime
            .bus()
            .emit(&Event::AppInitialized { modules });
        Ok(())
    }

    async fn load_features(&self, scan: &PageScan, report: &mut BootReport) {
        for (index, selector) in &scan.invalid {
            let feature = self.features[*index].name.clone();
            let error = format!("invalid selector '{selector}'");
            self.feature_failed(report, feature, error);
        }

        for &index in &scan.matched {
            let bundle = &self.features[index];
            match self.load_feature(bundle).await {
                Ok(()) => {
                    tracing::info!(feature = %bundle.name, "Feature loaded");
                    report.features_loaded.push(bundle.name.clone());
                    self.runtime.bus().emit(&Event::FeatureLoaded {
                        feature: bundle.name.clone(),
                    });
                }
                Err(err) => self.feature_failed(report, bundle.name.clone(), err.to_string()),
            }
        }
    }

    async fn load_feature(&self, bundle: &FeatureBundle) -> Result<(), BootError> {
        let asset = self.loader.fetch(&bundle.asset).await?;
        bundle.install(&self.runtime, &asset)?;
        self.runtime.modules().load(&bundle.name).await?;
        Ok(())
    }

    fn feature_failed(&self, report: &mut BootReport, feature: String, error: String) {
        tracing::warn!(feature = %feature, error = %error, "Feature failed to load");
        self.runtime.bus().emit(&Event::FeatureFailed {
            feature: feature.clone(),
            error: error.clone(),
        });
        report.features_failed.push(FeatureFailure { feature, error });
    }

    fn fall_back(
        &mut self,
        mut report: BootReport,
        cause: &BootError,
    ) -> Result<BootReport, BootError> {
        self.state.advance(BootState::Fallback)?;
        install_fallback(&self.runtime);

        let reason = cause.to_string();
        tracing::error!(error = %reason, "Boot failed; running in fallback mode");
        self.runtime.bus().emit(&Event::AppFallback {
            reason: reason.clone(),
        });

        report.state = self.state;
        report.fallback_reason = Some(reason);
        Ok(report)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("state", &self.state)
            .field("core_units", &self.core_units)
            .field("features", &self.features)
            .finish_non_exhaustive()
    }
}

/// Minimal capability set: HTML escaping and debouncing under `utils`, a
/// blocking notifier under `ui`. Replaces whatever was registered there.
pub fn install_fallback(runtime: &Runtime) {
    runtime.modules().provide(UTILS, Utils);
    runtime.modules().provide(UI, Ui::blocking());
}
