use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use indicatif::{HumanDuration, MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

pub struct Progress {
    enabled: bool,
    start: Instant,

    mp: Option<MultiProgress>,
    stage: ProgressBar,
    items: ProgressBar,

    items_done: AtomicU64,
    items_failed: AtomicU64,
}

impl Progress {
    pub fn new(enabled: bool) -> Arc<Self> {
        let start = Instant::now();

        if !enabled {
            return Arc::new(Self {
                enabled: false,
                start,
                mp: None,
                stage: ProgressBar::hidden(),
                items: ProgressBar::hidden(),
                items_done: AtomicU64::new(0),
                items_failed: AtomicU64::new(0),
            });
        }

        let mp = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());

        let stage = mp.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}  [{elapsed_precise}]") {
            stage.set_style(style);
        }
        stage.enable_steady_tick(Duration::from_millis(80));
        stage.set_message("starting");

        let items = mp.add(ProgressBar::new(0));
        if let Ok(style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}") {
            items.set_style(style.progress_chars("##-"));
        }

        Arc::new(Self {
            enabled: true,
            start,
            mp: Some(mp),
            stage,
            items,
            items_done: AtomicU64::new(0),
            items_failed: AtomicU64::new(0),
        })
    }

    pub fn set_stage(&self, msg: impl Into<String>) {
        if !self.enabled {
            return;
        }
        self.stage.set_message(msg.into());
    }

    pub fn set_total(&self, total: usize) {
        if self.enabled {
            self.items.set_length(total as u64);
        }
    }

    pub fn item_done(&self, label: &str) {
        self.items_done.fetch_add(1, Ordering::Relaxed);
        if self.enabled {
            self.items.inc(1);
            self.items.set_message(label.to_string());
        }
    }

    pub fn item_failed(&self, label: &str) {
        self.items_failed.fetch_add(1, Ordering::Relaxed);
        if self.enabled {
            self.items.inc(1);
            self.items.set_message(format!("{label} (failed)"));
        }
    }

    pub fn finish(&self) {
        if !self.enabled {
            return;
        }
        self.stage.finish_with_message("done");
        self.items.finish_and_clear();
        if let Some(mp) = &self.mp {
            let _ = mp.println(format!(
                "{} ok, {} failed in {}",
                self.items_done.load(Ordering::Relaxed),
                self.items_failed.load(Ordering::Relaxed),
                HumanDuration(self.start.elapsed())
            ));
        }
    }
}
