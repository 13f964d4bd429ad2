use buildflow_pipeline::{PipelineError, Stage, StageObserver};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;

/// Terminal spinner following the pipeline one stage at a time
pub struct StageProgress {
    current: Mutex<Option<ProgressBar>>,
}

impl StageProgress {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    fn spinner(message: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("{}...", message));
        pb
    }

    fn take(&self) -> Option<ProgressBar> {
        self.current.lock().ok().and_then(|mut current| current.take())
    }
}

impl StageObserver for StageProgress {
    fn stage_started(&self, stage: Stage) {
        if let Ok(mut current) = self.current.lock() {
            *current = Some(Self::spinner(stage.description()));
        }
    }

    fn stage_finished(&self, stage: Stage, detail: &str) {
        if let Some(pb) = self.take() {
            pb.finish_with_message(format!("{} ✓ {}", stage.description(), detail));
        }
    }

    fn stage_failed(&self, stage: Stage, _error: &PipelineError) {
        if let Some(pb) = self.take() {
            pb.abandon_with_message(format!("{} ✗", stage.description()));
        }
    }
}
