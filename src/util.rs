use std::time::{Duration, Instant};

pub fn format_hms(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        total / 3600,
        (total % 3600) / 60,
        total % 60,
        millis
    )
}

/// Print the time elapsed since `start` as hours:minutes:seconds.
pub fn print_hms(start: &Instant) {
    println!("Elapsed: {}", format_hms(start.elapsed()));
}
