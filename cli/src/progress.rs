use colored::*;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use raidscanner_core::{ProbeResult, ProgressObserver, ScanType};

/// Terminal observer: a progress bar on stderr, findings printed above it.
pub struct BarObserver {
    bar: ProgressBar,
    verbose: bool,
}

impl BarObserver {
    pub fn new(verbose: bool) -> Self {
        Self { bar: ProgressBar::hidden(), verbose }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressObserver for BarObserver {
    fn on_start(&self, scan_type: ScanType, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-");
        self.bar.set_style(style);
        self.bar.set_length(total as u64);
        self.bar.set_message(format!("{} probes", scan_type));
        self.bar.set_draw_target(ProgressDrawTarget::stderr());
    }

    fn on_result(&self, result: &ProbeResult) -> anyhow::Result<()> {
        if result.vulnerable {
            self.bar.println(format_finding(result));
        } else if self.verbose {
            if let Some(ref error) = result.error {
                let line = format!("{} {} ({})", "[-]".dimmed(), result.target_url, error.dimmed());
                self.bar.println(line);
            }
        }
        self.bar.inc(1);
        Ok(())
    }
}

fn format_finding(result: &ProbeResult) -> String {
    let status = result.status_code.map(|s| s.to_string()).unwrap_or_else(|| "N/A".to_string());
    let time = result
        .response_time
        .map(|t| format!("{:.2}s", t))
        .unwrap_or_else(|| "N/A".to_string());
    [
        format!("{} {}", "[+]".green().bold(), "Vulnerable!".red().bold()),
        format!("    Target:   {}", result.target_url.white()),
        format!("    Payload:  {}", result.payload.bright_yellow()),
        format!("    Evidence: {}", result.evidence.as_deref().unwrap_or("").cyan()),
        format!("    Info:     Status [{}] | Time [{}]", status.cyan(), time.dimmed()),
        format!("    curl:     {}", result.to_curl().dimmed()),
    ]
    .join("\n")
}
