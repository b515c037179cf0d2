use colored::*;
use std::io::{self, Write};
use tokio::time::{sleep, Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Sleeps for `duration`. Returns `false` if `cancel` fired first.
pub async fn pause(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = sleep(duration) => true,
    }
}

pub fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Like [`pause`], with a live countdown line on stdout.
pub async fn countdown(duration: Duration, label: &str, cancel: &CancellationToken) -> bool {
    let deadline = Instant::now() + duration;
    let mut stdout = io::stdout();

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }

        print!(
            "\r{} {}   ",
            label.cyan(),
            format_remaining(remaining).yellow().bold()
        );
        let _ = stdout.flush();

        if !pause(remaining.min(Duration::from_secs(1)), cancel).await {
            println!();
            return false;
        }
    }

    print!("\r{}\r", " ".repeat(label.len() + 16));
    let _ = stdout.flush();
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(Duration::from_secs(3725)), "01:02:05");
        assert_eq!(format_remaining(Duration::from_millis(900)), "00:00:00");
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_runs_full_duration() {
        let cancel = CancellationToken::new();
        let start = Instant::now();
        assert!(countdown(Duration::from_secs(5), "Next cycle in", &cancel).await);
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_pause() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            sleep(Duration::from_secs(10)).await;
            trigger.cancel();
        });

        let start = Instant::now();
        assert!(!countdown(Duration::from_secs(3600), "Waiting", &cancel).await);
        assert!(start.elapsed() < Duration::from_secs(3600));
    }
}
