use chrono::Local;
use tracing::info;

/// Local date and time, e.g. `Saturday, October 19, 2026 06:42 PM`.
pub fn current_date_and_time() -> String {
    let now = Local::now().format("%A, %B %-d, %Y %I:%M %p").to_string();
    info!("Current Date and Time: {}", now);
    now
}
