//! Console output control for the binary.

use std::time::Instant;

#[derive(Clone, Debug)]
pub struct OutputManager {
    verbose: bool,
    quiet: bool,
    start_time: Instant,
}

impl OutputManager {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            verbose,
            quiet,
            start_time: Instant::now(),
        }
    }

    pub fn info(&self, message: &str) {
        if !self.quiet {
            self.print("INFO", message);
        }
    }

    pub fn debug(&self, message: &str) {
        if self.verbose && !self.quiet {
            self.print("DEBUG", message);
        }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            self.print("OK", message);
        }
    }

    pub fn warning(&self, message: &str) {
        self.print("WARN", message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("[{:>8.2}s] ERROR {}", self.elapsed(), message);
    }

    fn print(&self, level: &str, message: &str) {
        println!("[{:>8.2}s] {:5} {}", self.elapsed(), level, message);
    }

    fn elapsed(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }
}

impl Default for OutputManager {
    fn default() -> Self {
        Self::new(false, false)
    }
}
