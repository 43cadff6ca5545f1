// # Diagnostics Queue
//
// Carries console lines from the engine thread to the host's own thread.
//
// The engine never prints. It pushes `(text, severity)` pairs here, and the
// host drains them on its per-frame tick. The lock is held only to append a
// single entry or to swap the whole queue out; printing happens after the
// lock is released, so a slow console never stalls producers.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// Prefix put in front of every console line
pub const CONSOLE_TAG: &str = "[ANNOUNCE]";

/// Severity of a diagnostic line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Informational message
    Info,
    /// Error message
    Error,
}

/// A single queued console line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Already formatted text
    pub text: String,
    /// Line severity
    pub severity: Severity,
}

impl Diagnostic {
    /// Whether this line is informational (as opposed to an error)
    pub fn is_informational(&self) -> bool {
        self.severity == Severity::Info
    }
}

/// Consumer side of the queue
pub trait DiagnosticSink {
    /// Print or record one drained line
    fn emit(&mut self, diagnostic: &Diagnostic);
}

/// Sink that writes drained lines to the console through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&mut self, diagnostic: &Diagnostic) {
        match diagnostic.severity {
            Severity::Info => tracing::info!(target: "announce", "{} {}", CONSOLE_TAG, diagnostic.text),
            Severity::Error => tracing::error!(target: "announce", "{} {}", CONSOLE_TAG, diagnostic.text),
        }
    }
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn emit(&mut self, diagnostic: &Diagnostic) {
        self.push(diagnostic.clone());
    }
}

/// Thread-safe FIFO of console lines
///
/// Cloning yields another handle to the same queue. The `verbose` flag is
/// fixed at construction and gates the `verbose_*` helpers only; plain
/// [`Diagnostics::info`] and [`Diagnostics::error`] are always queued.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    queue: Arc<Mutex<VecDeque<Diagnostic>>>,
    verbose: bool,
}

impl Diagnostics {
    /// Create an empty queue
    pub fn new(verbose: bool) -> Self {
        Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            verbose,
        }
    }

    /// Whether verbose lines are kept
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Append a line
    pub fn push(&self, text: impl Into<String>, severity: Severity) {
        let diagnostic = Diagnostic {
            text: text.into(),
            severity,
        };
        self.lock().push_back(diagnostic);
    }

    /// Append an informational line
    pub fn info(&self, text: impl Into<String>) {
        self.push(text, Severity::Info);
    }

    /// Append an error line
    pub fn error(&self, text: impl Into<String>) {
        self.push(text, Severity::Error);
    }

    /// Append an informational line when verbose output is enabled
    pub fn verbose_info(&self, text: impl Into<String>) {
        if self.verbose {
            self.info(text);
        }
    }

    /// Append an error line when verbose output is enabled
    pub fn verbose_error(&self, text: impl Into<String>) {
        if self.verbose {
            self.error(text);
        }
    }

    /// Number of queued lines
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove and return every queued line, oldest first
    pub fn drain(&self) -> Vec<Diagnostic> {
        let taken = std::mem::take(&mut *self.lock());
        taken.into()
    }

    /// Remove every queued line and hand them to `sink` in order
    ///
    /// Returns the number of lines emitted. Draining an empty queue is a no-op.
    pub fn drain_into(&self, sink: &mut dyn DiagnosticSink) -> usize {
        let taken = std::mem::take(&mut *self.lock());
        let count = taken.len();
        for diagnostic in &taken {
            sink.emit(diagnostic);
        }
        count
    }

    /// Remove every queued line and print it to the console
    pub fn drain_and_print(&self) -> usize {
        self.drain_into(&mut TracingSink)
    }

    // The queue only holds owned strings, so a panic while the lock was held
    // cannot leave it logically inconsistent.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Diagnostic>> {
        self.queue
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let diagnostics = Diagnostics::new(true);
        diagnostics.info("one");
        diagnostics.error("two");
        diagnostics.info("three");

        let drained = diagnostics.drain();
        let texts: Vec<_> = drained.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, ["one", "two", "three"]);
        assert!(drained[0].is_informational());
        assert!(!drained[1].is_informational());
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_drain_empty_is_noop() {
        let diagnostics = Diagnostics::default();
        let mut sink: Vec<Diagnostic> = Vec::new();
        assert_eq!(diagnostics.drain_into(&mut sink), 0);
        assert!(sink.is_empty());
        assert_eq!(diagnostics.drain_and_print(), 0);
    }

    #[test]
    fn test_verbose_gate() {
        let quiet = Diagnostics::new(false);
        quiet.verbose_info("hidden");
        quiet.verbose_error("hidden");
        quiet.error("shown");
        assert_eq!(quiet.len(), 1);

        let loud = Diagnostics::new(true);
        loud.verbose_info("a");
        loud.verbose_error("b");
        assert_eq!(loud.len(), 2);
    }

    #[test]
    fn test_concurrent_producer_sequential_consumer() {
        let diagnostics = Diagnostics::new(false);
        let producer = {
            let diagnostics = diagnostics.clone();
            thread::spawn(move || {
                for i in 0..2000 {
                    diagnostics.info(i.to_string());
                }
            })
        };

        let mut collected: Vec<Diagnostic> = Vec::new();
        while !producer.is_finished() {
            diagnostics.drain_into(&mut collected);
        }
        producer.join().unwrap();
        diagnostics.drain_into(&mut collected);

        let numbers: Vec<usize> = collected.iter().map(|d| d.text.parse().unwrap()).collect();
        assert_eq!(numbers, (0..2000).collect::<Vec<_>>());
    }
}
