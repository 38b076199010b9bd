use std::borrow::Cow;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use atlas_events::EventBus;
use atlas_types::{Event, NotifyLevel};
use atlas_utils::Utils;

/// User-facing message channel.
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NotifyLevel, message: &str);
}

/// Publishes notifications as `ui:notify` for whatever view layer listens.
#[derive(Debug, Clone)]
pub struct BusNotifier {
    bus: EventBus,
}

impl BusNotifier {
    #[must_use]
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }
}

impl Notifier for BusNotifier {
    fn notify(&self, level: NotifyLevel, message: &str) {
        self.bus.emit(&Event::Notify {
            level,
            message: message.to_string(),
        });
    }
}

/// Last-resort notifier: writes each message synchronously and flushes before
/// returning.
pub struct BlockingNotifier {
    out: Mutex<Box<dyn Write + Send>>,
}

impl BlockingNotifier {
    #[must_use]
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }

    pub fn new(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
        }
    }
}

impl Notifier for BlockingNotifier {
    fn notify(&self, level: NotifyLevel, message: &str) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let written = writeln!(out, "[{level}] {message}").and_then(|()| out.flush());
        if let Err(err) = written {
            tracing::error!(error = %err, "Failed to write notification");
        }
    }
}

impl std::fmt::Debug for BlockingNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingNotifier").finish_non_exhaustive()
    }
}

/// Instance behind the `ui` module.
#[derive(Clone)]
pub struct Ui {
    notifier: Arc<dyn Notifier>,
    utils: Utils,
}

impl Ui {
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>, utils: Utils) -> Self {
        Self { notifier, utils }
    }

    /// UI that reports straight to stderr.
    #[must_use]
    pub fn blocking() -> Self {
        Self::new(Arc::new(BlockingNotifier::stderr()), Utils)
    }

    pub fn notify(&self, level: NotifyLevel, message: &str) {
        self.notifier.notify(level, message);
    }

    pub fn info(&self, message: &str) {
        self.notify(NotifyLevel::Info, message);
    }

    pub fn success(&self, message: &str) {
        self.notify(NotifyLevel::Success, message);
    }

    pub fn warning(&self, message: &str) {
        self.notify(NotifyLevel::Warning, message);
    }

    pub fn error(&self, message: &str) {
        self.notify(NotifyLevel::Error, message);
    }

    /// Escape untrusted text before it is placed in markup.
    #[must_use]
    pub fn text<'a>(&self, input: &'a str) -> Cow<'a, str> {
        self.utils.escape_html(input)
    }
}

impl std::fmt::Debug for Ui {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ui").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_types::names;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn blocking_notifier_writes_each_message() {
        let buf = SharedBuf::default();
        let ui = Ui::new(Arc::new(BlockingNotifier::new(buf.clone())), Utils);

        ui.error("Saving failed");
        ui.info("Retrying");

        let written = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(written, "[error] Saving failed\n[info] Retrying\n");
    }

    #[test]
    fn bus_notifier_emits_notify_events() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _ = bus.on(names::NOTIFY, move |e: &Event| sink.lock().unwrap().push(e.clone()));

        let ui = Ui::new(Arc::new(BusNotifier::new(bus)), Utils);
        ui.success("Region saved");

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Event::Notify {
                level: NotifyLevel::Success,
                message: "Region saved".into(),
            }]
        );
    }

    #[test]
    fn text_is_escaped() {
        assert_eq!(Ui::blocking().text("<i>x</i>"), "&lt;i&gt;x&lt;/i&gt;");
    }
}
