use gatebench::engine::progress::{Progress, ProgressCallback};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 80;
const TRANSPORT: &str = "Transport";

/// Shows simulation phases as a spinner and the transport run as an event counter bar.
#[derive(Clone)]
pub struct CliProgressHandler {
    pb: Arc<Mutex<ProgressBar>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// A handler that draws nothing, for `--quiet`.
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let pb = ProgressBar::with_draw_target(Some(0), target).with_style(Self::phase_style());
        pb.finish_and_clear();
        Self {
            pb: Arc::new(Mutex::new(pb)),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let pb = self.pb.clone();

        Box::new(move |progress: Progress| {
            let Ok(bar) = pb.lock() else {
                warn!("Progress bar lock poisoned; dropping progress event.");
                return;
            };

            match progress {
                Progress::PhaseStart { name } => {
                    bar.reset();
                    bar.set_length(0);
                    bar.set_style(Self::phase_style());
                    bar.set_prefix(name);
                    bar.set_message("");
                    bar.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                }
                Progress::PhaseFinish => {
                    bar.disable_steady_tick();
                    bar.set_style(Self::done_style());
                    bar.finish_with_message("complete");
                }
                Progress::RunStart { total_events } => {
                    bar.disable_steady_tick();
                    bar.reset();
                    bar.set_style(Self::events_style());
                    bar.set_prefix(TRANSPORT);
                    bar.set_length(total_events);
                    bar.set_position(0);
                }
                Progress::EventsProcessed(n) => bar.inc(n),
                Progress::RunFinish => {
                    let total = bar.length().unwrap_or(0);
                    bar.set_position(total);
                    bar.set_style(Self::done_style());
                    bar.finish_with_message(format!("{total} events"));
                }
                Progress::Message(msg) if bar.is_finished() => bar.set_message(msg),
                Progress::Message(msg) => bar.println(format!("  {msg}")),
            }
        })
    }

    fn phase_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.green} {prefix:.bold} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn events_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "  {prefix:.bold} [{wide_bar:.cyan/blue}] {human_pos}/{human_len} events, {per_sec}, ETA {eta}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
    }

    fn done_style() -> ProgressStyle {
        ProgressStyle::with_template("{prefix:.bold.green} ✓ {msg} ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn handler_starts_finished_and_empty() {
        let handler = CliProgressHandler::hidden();
        let pb = handler.pb.lock().unwrap();
        assert_eq!(pb.length(), Some(0));
        assert!(pb.is_finished());
    }

    #[test]
    fn run_counts_transported_events() {
        let handler = CliProgressHandler::hidden();
        let callback = handler.get_callback();

        callback(Progress::PhaseStart { name: "Initialization" });
        {
            let pb = handler.pb.lock().unwrap();
            assert_eq!(pb.prefix(), "Initialization");
            assert!(!pb.is_finished());
        }
        callback(Progress::PhaseFinish);
        assert_eq!(handler.pb.lock().unwrap().message(), "complete");

        callback(Progress::RunStart { total_events: 2500 });
        callback(Progress::EventsProcessed(1000));
        callback(Progress::EventsProcessed(1000));
        {
            let pb = handler.pb.lock().unwrap();
            assert_eq!(pb.prefix(), TRANSPORT);
            assert_eq!(pb.length(), Some(2500));
            assert_eq!(pb.position(), 2000);
        }

        callback(Progress::RunFinish);
        let pb = handler.pb.lock().unwrap();
        assert!(pb.is_finished());
        assert_eq!(pb.position(), 2500);
        assert_eq!(pb.message(), "2500 events");
    }

    #[test]
    fn messages_after_a_finished_run_become_the_status() {
        let handler = CliProgressHandler::hidden();
        let callback = handler.get_callback();
        callback(Progress::RunStart { total_events: 10 });
        callback(Progress::RunFinish);
        callback(Progress::Message("wrote stats.txt".to_string()));
        assert_eq!(handler.pb.lock().unwrap().message(), "wrote stats.txt");
    }

    #[test]
    fn callback_can_run_on_another_thread() {
        let handler = CliProgressHandler::hidden();
        let callback = handler.get_callback();

        thread::spawn(move || {
            callback(Progress::PhaseStart { name: "Initialization" });
            callback(Progress::PhaseFinish);
        })
        .join()
        .unwrap();

        assert!(handler.pb.lock().unwrap().is_finished());
    }
}
