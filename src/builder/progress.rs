//! Run progress reporting

use super::{BuildError, BuildReport};
use crate::model::User;
use crate::source::MutualFetchError;
use std::io::{self, Write};

/// Receives progress events from a build.
///
/// Positions are 1-based. Every method defaults to doing nothing.
pub trait ProgressSink: Send {
    fn started(&mut self, _owner: &User, _total: usize) {}

    fn fetching(&mut self, _position: usize, _total: usize, _friend: &User) {}

    fn already_loaded(&mut self, _position: usize, _total: usize, _friend: &User) {}

    fn fetch_failed(&mut self, _position: usize, _total: usize, _friend: &User, _error: &MutualFetchError) {}

    fn finished(&mut self, _report: &BuildReport) {}

    /// The run ended early; cache and graph were still written
    fn stopped(&mut self, _report: &BuildReport, _error: &BuildError) {}
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentProgress;

impl ProgressSink for SilentProgress {}

/// Human-readable progress lines.
///
/// Output is best effort; a closed pipe does not fail the build.
pub struct ConsoleProgress<W: Write + Send> {
    out: W,
}

impl ConsoleProgress<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleProgress<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn summary(&mut self, report: &BuildReport) {
        let _ = writeln!(self.out, "{}", report.summary_line());
        let _ = writeln!(self.out, "Mutual friends written to {}", report.cache_path.display());
        let _ = writeln!(
            self.out,
            "Graph written to {} ({} nodes, {} edges)",
            report.graph_path.display(),
            report.graph.nodes,
            report.graph.edges
        );
    }
}

impl<W: Write + Send> ProgressSink for ConsoleProgress<W> {
    fn started(&mut self, owner: &User, total: usize) {
        let _ = writeln!(self.out, "Retrieved {} friends of {}", total, owner);
        let _ = writeln!(self.out);
    }

    fn fetching(&mut self, position: usize, total: usize, friend: &User) {
        let _ = writeln!(
            self.out,
            "{}/{}: Retrieving mutual friends of {}...",
            position, total, friend
        );
    }

    fn already_loaded(&mut self, position: usize, total: usize, friend: &User) {
        let _ = writeln!(
            self.out,
            "{}/{}: {} mutual friends have already been loaded",
            position, total, friend
        );
    }

    fn fetch_failed(&mut self, position: usize, total: usize, friend: &User, error: &MutualFetchError) {
        let _ = writeln!(
            self.out,
            "{}/{}: Could not retrieve mutual friends of {}, will retry next run ({})",
            position, total, friend, error.source
        );
    }

    fn finished(&mut self, report: &BuildReport) {
        let _ = writeln!(self.out);
        self.summary(report);
        let _ = writeln!(self.out, "Done!");
        let _ = self.out.flush();
    }

    fn stopped(&mut self, report: &BuildReport, error: &BuildError) {
        let _ = writeln!(self.out);
        let _ = writeln!(self.out, "Stopped early: {}", error);
        self.summary(report);
        let _ = self.out.flush();
    }
}
