use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal};
use std::time::Duration;

/// Spinner shown while a source is being queried; silent when stdout is
/// not a terminal or the output is meant for machines
pub struct SourceProgress {
    spinner: Option<ProgressBar>,
    verbose: bool,
}

impl SourceProgress {
    pub fn new(source_name: &str, quiet: bool, verbose: bool) -> Self {
        let enabled = !quiet && io::stdout().is_terminal();
        let spinner = enabled.then(|| spinner(&messages::fetching(source_name)));
        Self { spinner, verbose }
    }

    pub fn set_message(&self, message: &str) {
        if let Some(pb) = &self.spinner {
            pb.set_message(message.to_string());
        }
        if self.verbose && self.spinner.is_some() {
            eprintln!("🔍 {}", message);
        }
    }

    pub fn finish_with_message(&self, message: &str) {
        if let Some(pb) = &self.spinner {
            pb.finish_with_message(format!("✅ {}", message));
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.spinner.is_some()
    }
}

impl Drop for SourceProgress {
    fn drop(&mut self) {
        if let Some(pb) = &self.spinner {
            pb.finish_and_clear();
        }
    }
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style.tick_strings(&["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"]));
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub mod messages {
    pub fn fetching(source_name: &str) -> String {
        format!("{} を取得中...", source_name)
    }

    pub fn fetched(source_name: &str, count: usize) -> String {
        format!("{}: {}件", source_name, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_progress_is_disabled() {
        let progress = SourceProgress::new("ニュース", true, false);
        assert!(!progress.is_enabled());
        progress.set_message("テスト");
        progress.finish_with_message("完了");
    }

    #[test]
    fn test_messages() {
        assert_eq!(messages::fetching("e-Gov法令"), "e-Gov法令 を取得中...");
        assert_eq!(messages::fetched("ニュース", 9), "ニュース: 9件");
    }
}
