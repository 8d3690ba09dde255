use serde::Deserialize;

/// A log line forwarded by the reader or editor frontend
#[derive(Debug, Clone, Deserialize)]
pub struct FrontendLog {
    pub level: String,
    pub message: String,
    pub context: Option<String>,
}

pub fn frontend_log(entry: &FrontendLog) {
    let context = entry.context.as_deref().unwrap_or("");
    match entry.level.as_str() {
        "error" => tracing::error!(target: "frontend", context, "{}", entry.message),
        "warn" => tracing::warn!(target: "frontend", context, "{}", entry.message),
        "debug" => tracing::debug!(target: "frontend", context, "{}", entry.message),
        _ => tracing::info!(target: "frontend", context, "{}", entry.message),
    }
}
