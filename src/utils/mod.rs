//! Utilities module for logging, error handling and output formatting

pub mod error;
pub mod logging;

// Re-export main types for convenience
pub use error::{MpoxError, Result};
pub use logging::{init_logging, LogConfig, LogLevel};

/// Format a duration in a human-readable way
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{:.1}s", seconds)
    } else if seconds < 3600.0 {
        let minutes = (seconds / 60.0).floor();
        let secs = seconds % 60.0;
        format!("{}m {:.0}s", minutes as u32, secs)
    } else {
        let hours = (seconds / 3600.0).floor();
        let minutes = ((seconds % 3600.0) / 60.0).floor();
        format!("{}h {}m", hours as u32, minutes as u32)
    }
}

/// Render a probability as a fixed-width bar, e.g. `[█████░░░░░] 50.0%`
pub fn format_probability_bar(probability: f32, width: usize) -> String {
    let clamped = probability.clamp(0.0, 1.0);
    let filled = (clamped * width as f32).round() as usize;
    let empty = width.saturating_sub(filled);

    format!(
        "[{}{}] {:.1}%",
        "█".repeat(filled),
        "░".repeat(empty),
        clamped * 100.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(30.5), "30.5s");
        assert_eq!(format_duration(90.0), "1m 30s");
        assert_eq!(format_duration(3661.0), "1h 1m");
    }

    #[test]
    fn test_format_probability_bar() {
        let bar = format_probability_bar(0.5, 10);
        assert!(bar.contains("50.0%"));
        assert!(bar.contains("█████░░░░░"));

        // Out-of-range input is clamped rather than overflowing the bar
        let bar = format_probability_bar(1.7, 4);
        assert!(bar.starts_with("[████]"));
    }
}
