use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::thread;
use std::time::Duration;

const TICK: Duration = Duration::from_millis(250);

/// Upper bound the ticker advances to on its own; only `finish` completes the bar.
const CEILING: u64 = 95;

/// Cosmetic progress bar that creeps forward on a timer while a request is in flight.
pub struct Ticker {
    bar: ProgressBar,
}

impl Ticker {
    pub fn start(message: &str) -> Self {
        Self::with_bar(ProgressBar::new(100), message)
    }

    /// A ticker that draws nowhere.
    pub fn hidden(message: &str) -> Self {
        Self::with_bar(
            ProgressBar::with_draw_target(Some(100), ProgressDrawTarget::hidden()),
            message,
        )
    }

    fn with_bar(bar: ProgressBar, message: &str) -> Self {
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg} [{bar:30.cyan/blue}]") {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message(message.to_string());

        let ticking = bar.clone();
        thread::spawn(move || {
            while !ticking.is_finished() {
                if ticking.position() < CEILING {
                    ticking.inc(1);
                }
                ticking.tick();
                thread::sleep(TICK);
            }
        });

        Ticker { bar }
    }

    pub fn finish(self) {
        self.bar.finish_and_clear();
    }
}
