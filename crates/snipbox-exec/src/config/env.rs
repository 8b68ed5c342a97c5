use super::{Config, split_list};

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SNIPBOX_BLOCKED_PACKAGES") {
            self.blocked.packages = split_list(&v);
        }
        if let Ok(v) = std::env::var("SNIPBOX_BLOCKED_CLASSES") {
            self.blocked.classes = split_list(&v);
        }
        if let Ok(v) = std::env::var("SNIPBOX_BLOCKED_METHODS") {
            self.blocked.methods = split_list(&v);
        }
        if let Ok(v) = std::env::var("SNIPBOX_TIMEOUT_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                self.execution.timeout_ms = ms;
            } else {
                tracing::warn!("ignoring invalid SNIPBOX_TIMEOUT_MS value: {v}");
            }
        }
        if let Ok(v) = std::env::var("SNIPBOX_STOP_GRACE_MS") {
            if let Ok(ms) = v.parse::<u64>() {
                self.execution.stop_grace_ms = ms;
            } else {
                tracing::warn!("ignoring invalid SNIPBOX_STOP_GRACE_MS value: {v}");
            }
        }
        if let Ok(v) = std::env::var("SNIPBOX_OUTPUT_MAX_BYTES") {
            if let Ok(bytes) = v.parse::<usize>() {
                self.output.max_bytes = bytes;
            } else {
                tracing::warn!("ignoring invalid SNIPBOX_OUTPUT_MAX_BYTES value: {v}");
            }
        }
        if let Ok(v) = std::env::var("SNIPBOX_AUDIT_ENABLED")
            && let Ok(enabled) = v.parse::<bool>()
        {
            self.audit.enabled = enabled;
        }
        if let Ok(v) = std::env::var("SNIPBOX_AUDIT_DESTINATION") {
            self.audit.destination = v.into();
        }
    }
}
