use std::{io::Write, sync::Once};

/// Init log. Set log format.
pub fn init_log() {
    env_logger::builder()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}:{} - {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S"),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .init();
}

static INIT_LOG: Once = Once::new();

/// Setup.
pub fn setup_log() {
    INIT_LOG.call_once(|| {
        init_log();
    });
}

#[macro_export]
macro_rules! error_bail {
    ($msg:literal $(,)?) => {
        log::error!($msg);
        anyhow::bail!($msg)
    };
    ($err:expr $(,)?) => {
        log::error!("{}", $err);
        anyhow::bail!($err)
    };
    ($fmt:expr, $($arg:tt)*) => {
        log::error!($fmt, $($arg)*);
        anyhow::bail!($fmt, $($arg)*)
    };
}

/// Number of records between two progress lines, so that a run logs about 20 of them.
///
/// Never returns 0.
#[inline]
pub fn progress_interval(total: u64) -> u64 {
    (total / 20).max(1)
}

/// Format `count` out of `total` as a percentage with one decimal.
pub fn percent(count: u64, total: u64) -> String {
    if total == 0 {
        return "100.0%".to_string();
    }

    format!("{:.1}%", count as f64 * 100.0 / total as f64)
}
