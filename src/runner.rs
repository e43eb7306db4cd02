use std::fmt::Display;

use crate::{Status, Verdict};

/// Runs a check function and folds its error into a terminal [`Verdict`],
/// so the binary always ends up with exactly one status line to print.
///
/// By default an error becomes [`Status::Critical`]; a plugin whose failure
/// modes mean "could not determine anything" overrides that with
/// [`Runner::on_error`].
pub struct Runner<E> {
    plugin: &'static str,
    on_error: Option<Box<dyn FnOnce(&E) -> Status>>,
}

impl<E: Display> Runner<E> {
    pub fn new(plugin: &'static str) -> Self {
        Self {
            plugin,
            on_error: None,
        }
    }

    /// Chooses the severity reported when the check function fails.
    pub fn on_error(mut self, f: impl FnOnce(&E) -> Status + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    /// Runs the check function. An `Err` is rendered through its `Display`
    /// impl with the severity chosen by the `on_error` handler.
    pub fn safe_run(self, f: impl FnOnce() -> Result<Verdict, E>) -> RunnerResult {
        let verdict = match f() {
            Ok(verdict) => verdict,
            Err(err) => {
                let status = match self.on_error {
                    Some(on_error) => on_error(&err),
                    None => Status::Critical,
                };
                Verdict::new(status, err.to_string())
            }
        };

        RunnerResult {
            plugin: self.plugin,
            verdict,
        }
    }
}

/// A finished run, ready to be reported.
pub struct RunnerResult {
    plugin: &'static str,
    verdict: Verdict,
}

impl RunnerResult {
    pub fn verdict(&self) -> &Verdict {
        &self.verdict
    }

    pub fn print_and_exit(self) -> ! {
        self.verdict.print_and_exit(self.plugin)
    }
}
