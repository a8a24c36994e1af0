use std::time::{Duration, Instant};
use tracing::info;

/// Wall-clock timer that logs when it starts and when it is dropped.
pub struct Timer {
    label: String,
    start: Instant,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        info!("⏱  Starting: {}", label);
        Self {
            label,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!("⏱  Finished: {} (took {:.2?})", self.label, self.elapsed());
    }
}

/// Thousands separators for the stats table. 1234567 → "1,234,567"
pub fn fmt_number(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Trim and collapse every whitespace run into a single `sep`.
/// ("  무선   충전기 ", " ") → "무선 충전기"
pub fn collapse_whitespace(s: &str, sep: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(sep)
}
