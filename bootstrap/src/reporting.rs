//! Global error interception.
//!
//! Panics and failed background tasks are re-emitted on the bus. Nothing else
//! is done with them.

use std::cell::Cell;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use atlas_events::{EventBus, panic_payload_to_string};
use atlas_types::Event;
use futures_util::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

thread_local! {
    static REPORTER: Cell<bool> = const { Cell::new(false) };
}

/// Chain a panic hook that reports panics as `error:uncaught`.
///
/// The hook only queues the event. A dedicated reporter thread emits it, so
/// listeners never run inside the hook. Panics raised by those listeners are
/// caught by `emit` and not reported again.
pub fn install_panic_hook(bus: EventBus) {
    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();

    let spawned = thread::Builder::new()
        .name("atlas-panic-reporter".into())
        .spawn(move || {
            REPORTER.with(|flag| flag.set(true));
            while let Some(event) = rx.blocking_recv() {
                bus.emit(&event);
            }
        });
    if let Err(err) = spawned {
        tracing::warn!(error = %err, "Failed to start panic reporter; panics will not be re-emitted");
        return;
    }

    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        if !REPORTER.with(Cell::get) {
            let _ = tx.send(Event::UncaughtError {
                message: panic_payload_to_string(info.payload()),
                location: info.location().map(ToString::to_string),
            });
        }
        previous(info);
    }));
}

/// Spawn `future`; an error or panic is emitted as `error:unhandled`.
pub fn spawn_reported<F>(bus: EventBus, task: impl Into<String>, future: F) -> JoinHandle<()>
where
    F: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    let task = task.into();
    tokio::spawn(async move {
        let message = match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(())) => return,
            Ok(Err(err)) => format!("{err:#}"),
            Err(payload) => panic_payload_to_string(&*payload),
        };
        tracing::warn!(task = %task, error = %message, "Background task failed");
        bus.emit(&Event::UnhandledRejection { task, message });
    })
}
