//! Boot orchestration for the Atlas runtime.
//!
//! A boot walks [`BootState`] from `Uninitialized` to `FeaturesReady`:
//!
//! 1. **LoadingCore**: fetch each [`CoreUnit`] asset in order and run its
//!    installer. The first failure aborts the boot.
//! 2. **ModulesReady**: load the foundational `utils`, `api` and `ui`
//!    modules, fill unset configuration with defaults and emit
//!    `app:initialized`.
//! 3. **FeaturesReady**: load each [`FeatureBundle`] whose selector matches
//!    the page markup. A failing bundle is skipped.
//!
//! A failure in the first two steps installs the fallback capability set and
//! ends in `Fallback`.

mod error;
pub mod foundation;
mod orchestrator;
mod page;
mod reporting;
mod runtime;
mod state;
mod ui;
mod units;

pub use error::BootError;
pub use orchestrator::{BootReport, FeatureFailure, Orchestrator, install_fallback};
pub use page::{PageScan, csrf_token, scan_page};
pub use reporting::{install_panic_hook, spawn_reported};
pub use runtime::{Runtime, SharedConfig};
pub use state::BootState;
pub use ui::{BlockingNotifier, BusNotifier, Notifier, Ui};
pub use units::{Asset, CoreUnit, FeatureBundle, HttpUnitLoader, Installer, LoadFut, UnitLoader};
