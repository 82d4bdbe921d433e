//! Interactive device selection

use std::io::{BufRead, Write};

use async_trait::async_trait;
use romlink_manager::DeviceSelector;

/// Picks the device named by `--device`, or prompts on stdin
pub struct PromptSelector {
    preferred: Option<String>,
}

impl PromptSelector {
    pub fn new(preferred: Option<String>) -> Self {
        Self { preferred }
    }
}

#[async_trait]
impl DeviceSelector for PromptSelector {
    async fn select(&self, candidates: &[String]) -> Option<usize> {
        if let Some(wanted) = &self.preferred {
            return match_candidate(candidates, wanted);
        }

        let candidates = candidates.to_vec();
        tokio::task::spawn_blocking(move || prompt(&candidates))
            .await
            .ok()
            .flatten()
    }
}

/// Exact label match first, then case-insensitive prefix of the label
fn match_candidate(candidates: &[String], wanted: &str) -> Option<usize> {
    if let Some(idx) = candidates.iter().position(|c| c == wanted) {
        return Some(idx);
    }
    let wanted = wanted.to_lowercase();
    candidates
        .iter()
        .position(|c| c.to_lowercase().starts_with(&wanted))
}

fn prompt(candidates: &[String]) -> Option<usize> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let _ = writeln!(out, "Multiple devices found:");
    for (i, candidate) in candidates.iter().enumerate() {
        let _ = writeln!(out, "  [{}] {}", i + 1, candidate);
    }
    let _ = write!(out, "Select a device (empty to cancel): ");
    let _ = out.flush();

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line).ok()?;
    parse_choice(&line, candidates.len())
}

/// 1-based choice to index
fn parse_choice(line: &str, count: usize) -> Option<usize> {
    let n: usize = line.trim().parse().ok()?;
    (1..=count).contains(&n).then(|| n - 1)
}
