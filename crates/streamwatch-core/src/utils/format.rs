//! Human-readable sizes.

const UNITS: [&str; 6] = ["", "Ki", "Mi", "Gi", "Ti", "Pi"];

/// Format a byte count with binary units and one decimal, e.g. `500.0 MiB`.
#[allow(clippy::cast_precision_loss, reason = "display only")]
pub fn human_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in UNITS {
        if value < 1024.0 {
            return format!("{value:.1} {unit}B");
        }
        value /= 1024.0;
    }
    format!("{value:.1} EiB")
}
