use chrono::Utc;

const POLLER_WORKERS: &str = "POLLER_WORKERS";

/// Current wall-clock time as unix seconds, the unit item clocks are kept in
pub fn clock() -> i64 {
    Utc::now().timestamp()
}

/// Worker count override from the environment, if set and valid
pub fn get_workers_override() -> Option<usize> {
    let workers_from_env = std::env::var(POLLER_WORKERS);
    workers_from_env
        .ok()
        .and_then(|res| res.parse().ok())
        .filter(|workers| *workers > 0)
}
