//! CLI-specific progress handling for butterfly-simplify
//!
//! Shows one progress bar tick per pipeline stage.

use butterfly_simplify::{Defect, Network, Observer, Stage};
use indicatif::{ProgressBar, ProgressStyle};

/// Creates a progress bar counting pipeline stages
pub fn create_progress_bar(total_stages: u64) -> ProgressBar {
    let pb = ProgressBar::new(total_stages);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb
}

/// Pipeline observer driving a progress bar
pub struct ProgressObserver {
    pub pb: ProgressBar,
}

impl ProgressObserver {
    pub fn new(message: &str) -> Self {
        let pb = create_progress_bar(Stage::ALL.len() as u64);

        // Print initial message to stderr
        eprintln!("{}", message);

        Self { pb }
    }
}

impl Observer for ProgressObserver {
    fn stage_started(&mut self, stage: Stage) {
        self.pb.set_message(format!("{}...", stage));
    }

    fn stage_finished(&mut self, stage: Stage, network: &Network) {
        self.pb.inc(1);
        self.pb.set_message(format!(
            "{} done ({} nodes, {} edges)",
            stage,
            network.nodes.len(),
            network.edges.len()
        ));
        if stage == Stage::Validate {
            self.pb.finish_with_message("✅ Simplification completed!");
        }
    }

    fn defects(&mut self, stage: Stage, defects: &[Defect]) {
        self.pb
            .println(format!("⚠️  {}: {} defect(s)", stage, defects.len()));
    }

    fn stage_skipped(&mut self, _stage: Stage) {
        self.pb.inc(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_progress_bar_template() {
        let pb = create_progress_bar(9);
        assert_eq!(pb.length().unwrap(), 9);
        pb.set_position(3);
        pb.finish();
    }

    #[test]
    fn test_observer_counts_stages() {
        let mut observer = ProgressObserver::new("Test run");
        observer.stage_started(Stage::Decompose);
        observer.stage_finished(Stage::Decompose, &Network::default());
        observer.stage_skipped(Stage::Round);
        assert_eq!(observer.pb.position(), 2);
    }
}
