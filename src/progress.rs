//! Progress reporting utilities using indicatif.
//!
//! [`ProgressCallback`] is the hook the record builder and the detection
//! orchestrator call into; [`Progress`] renders it as terminal progress bars
//! for the CLI.

use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Progress callback for record building and detection stages.
///
/// Phases reported: `records`, `exact`, `perceptual`, `content`.
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts with the number of items it will process.
    fn on_phase_start(&self, phase: &str, total: usize);

    /// Called for each item processed (`current` is 1-based).
    fn on_progress(&self, current: usize, item: &str);

    /// Called when a phase completes.
    fn on_phase_end(&self, phase: &str);

    /// Called to update the progress message.
    fn on_message(&self, _message: &str) {}
}

/// Progress reporter using indicatif.
pub struct Progress {
    multi: MultiProgress,
    active: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a new progress reporter. Nothing is drawn when `quiet` is set.
    ///
    /// # Examples
    ///
    /// ```
    /// use stagededupe::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            active: Mutex::new(None),
            quiet,
        }
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
    }

    fn with_active(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.active.lock() {
            if let Some(ref pb) = *guard {
                f(pb);
            }
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: &str, total: usize) {
        if self.quiet {
            return;
        }

        let pb = match phase {
            // The content stage is one opaque oracle call
            "content" => {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(Self::spinner_style());
                pb.enable_steady_tick(Duration::from_millis(100));
                pb
            }
            _ => {
                let pb = self.multi.add(ProgressBar::new(total as u64));
                pb.set_style(Self::bar_style());
                pb
            }
        };
        pb.set_message(phase_label(phase));

        if let Ok(mut active) = self.active.lock() {
            *active = Some(pb);
        }
    }

    fn on_progress(&self, current: usize, item: &str) {
        if self.quiet {
            return;
        }
        let msg = truncate_item(item, 30);
        self.with_active(|pb| {
            pb.set_position(current as u64);
            pb.set_message(msg);
        });
    }

    fn on_phase_end(&self, phase: &str) {
        if self.quiet {
            return;
        }
        if let Ok(mut active) = self.active.lock() {
            if let Some(pb) = active.take() {
                pb.finish_with_message(format!("{} complete", phase_label(phase)));
            }
        }
    }

    fn on_message(&self, message: &str) {
        if self.quiet {
            return;
        }
        self.with_active(|pb| pb.set_message(message.to_string()));
    }
}

fn phase_label(phase: &str) -> String {
    match phase {
        "records" => "Building records".to_string(),
        "exact" => "Exact hash matching".to_string(),
        "perceptual" => "Perceptual clustering".to_string(),
        "content" => "Content similarity".to_string(),
        other => other.to_string(),
    }
}

/// Truncate an item (usually a path) for display in the progress bar.
fn truncate_item(item: &str, max_len: usize) -> String {
    if item.chars().count() <= max_len {
        return item.to_string();
    }

    let file_name = std::path::Path::new(item)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let count = file_name.chars().count();
    if count >= max_len {
        let tail: String = file_name.chars().skip(count + 3 - max_len).collect();
        return format!("...{tail}");
    }

    format!(".../{file_name}")
}
