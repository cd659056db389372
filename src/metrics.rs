/// Prometheus metrics, exposed in text format at `/metrics`.
use lazy_static::lazy_static;
use prometheus::{
    register_int_counter_vec, Encoder, IntCounterVec, TextEncoder,
};

lazy_static! {
    /// Login attempts (labels: status=success|failed|inactive)
    pub static ref LOGIN_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "bookworm_login_attempts_total",
        "Total number of login attempts",
        &["status"]
    )
    .unwrap();

    /// Registrations (labels: status=success|failed)
    pub static ref REGISTRATION_TOTAL: IntCounterVec = register_int_counter_vec!(
        "bookworm_registrations_total",
        "Total number of registration attempts",
        &["status"]
    )
    .unwrap();

    /// Follow toggles (labels: action=follow|unfollow)
    pub static ref FOLLOW_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "bookworm_follow_events_total",
        "Total number of follow/unfollow actions",
        &["action"]
    )
    .unwrap();

    /// Like toggles (labels: action=like|unlike)
    pub static ref LIKE_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "bookworm_like_events_total",
        "Total number of like/unlike actions",
        &["action"]
    )
    .unwrap();

    /// Bookmarked images created (labels: status=success|fetch_failed)
    pub static ref IMAGES_CREATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "bookworm_images_created_total",
        "Total number of image bookmark creations",
        &["status"]
    )
    .unwrap();
}

pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if encoder.encode(&metric_families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let before = FOLLOW_EVENTS_TOTAL.with_label_values(&["follow"]).get();
        FOLLOW_EVENTS_TOTAL.with_label_values(&["follow"]).inc();
        assert_eq!(
            FOLLOW_EVENTS_TOTAL.with_label_values(&["follow"]).get(),
            before + 1
        );
    }

    #[test]
    fn gather_renders_text_format() {
        LIKE_EVENTS_TOTAL.with_label_values(&["like"]).inc();
        let out = gather_metrics();
        assert!(out.contains("bookworm_like_events_total"));
    }
}
