use crate::Result;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

/// Value returned by a measured call together with its wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timed<T> {
    pub value: T,
    pub elapsed: Duration,
}

impl<T> Timed<T> {
    pub fn into_parts(self) -> (T, Duration) {
        (self.value, self.elapsed)
    }
}

/// Run `f`, reporting how long it took under `label`.
pub fn measure_perf<T>(label: &str, f: impl FnOnce() -> T) -> Timed<T> {
    let start = Instant::now();
    let value = f();
    let elapsed = start.elapsed();
    tracing::info!(
        target: "stereo_depth::perf",
        label,
        elapsed_secs = elapsed.as_secs_f64(),
        "executed in {:.2} seconds",
        elapsed.as_secs_f64()
    );
    Timed { value, elapsed }
}

/// Like [`measure_perf`], also appending a `[PERFORMANCE]` line to `output`.
///
/// The parent directory is created if missing. `f` has already run when a
/// write error is returned.
pub fn measure_perf_to_file<T>(
    label: &str,
    output: impl AsRef<Path>,
    f: impl FnOnce() -> T,
) -> Result<Timed<T>> {
    let timed = measure_perf(label, f);
    let output = output.as_ref();
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(output)?;
    writeln!(
        file,
        "[PERFORMANCE] '{label}' executed in {:.2} seconds",
        timed.elapsed.as_secs_f64()
    )?;
    Ok(timed)
}
