use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{emoji, heading, highlight, success};

/// Progress tracking for the seeding phases
pub struct PhaseProgress {
    pb: ProgressBar,
}

impl PhaseProgress {
    pub fn start_loading() -> Self {
        eprintln!("{}  {}", emoji("⚙️"), heading("Phases"));
        let pb = create_spinner(highlight("Phase 1/3: Loading pipeline definition").to_string());
        Self { pb }
    }

    pub fn finish_loading_start_seeding(self, stages: usize) -> Self {
        self.pb.finish_with_message(
            success(format!("Phase 1/3: Loaded {stages} declared stages ✓")).to_string(),
        );
        let pb = create_spinner(highlight("Phase 2/3: Seeding stages and jobs").to_string());
        Self { pb }
    }

    pub fn finish_seeding_start_persisting(self, included: usize) -> Self {
        self.pb.finish_with_message(
            success(format!("Phase 2/3: Seeded {included} stages with jobs ✓")).to_string(),
        );
        let pb = create_spinner(highlight("Phase 3/3: Persisting pipeline").to_string());
        Self { pb }
    }

    pub fn finish_persisting(self) {
        self.pb
            .finish_with_message(success("Phase 3/3: Pipeline persisted ✓").to_string());
        eprintln!("\n");
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {msg} {spinner}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
