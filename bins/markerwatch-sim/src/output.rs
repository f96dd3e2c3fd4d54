//! Terminal output helpers

use owo_colors::OwoColorize;

/// Status message helpers
pub struct Status;

impl Status {
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    pub fn warning(message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    pub fn info(message: &str) {
        println!("{} {}", "ℹ".blue(), message);
    }

    pub fn header(message: &str) {
        println!();
        println!("{}", message.bold());
        println!("{}", "─".repeat(message.chars().count()));
    }
}

/// Meters as `12.3 m` or `1.23 km`.
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{:.1} m", meters)
    } else {
        format!("{:.2} km", meters / 1000.0)
    }
}

/// `1 marker`, `3 markers`
pub fn format_count(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{} {}", count, singular)
    } else {
        format!("{} {}", count, plural)
    }
}
