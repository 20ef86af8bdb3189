//! Structured status reporting for core components

use serde::{Deserialize, Serialize};

/// A core component that can report its status
pub trait Component {
    /// Stable component name
    fn name(&self) -> &'static str;

    /// Current status snapshot
    fn status(&self) -> ComponentStatus;
}

/// Status snapshot of one component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentStatus {
    /// Component name
    pub name: String,
    /// Whether the component can serve requests
    pub healthy: bool,
    /// Component-specific counters
    pub stats: ComponentStats,
}

/// Typed statistics, one variant per component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComponentStats {
    /// Key store contents
    KeyStore {
        /// Backend name (`memory`, `file`)
        backend: String,
        /// Number of keys held
        keys: usize,
    },

    /// Encryption engine activity
    Engine {
        /// Successful encryptions
        encryptions: u64,
        /// Successful decryptions
        decryptions: u64,
        /// Decryptions rejected by the AEAD tag check
        authentication_failures: u64,
        /// Decryptions refused because the blob names another alias
        alias_mismatches: u64,
    },

    /// Key sharding activity
    Sharding {
        /// Threshold of the default policy
        threshold: usize,
        /// Number of factors in the default policy
        factors: usize,
        /// Split operations performed
        splits: u64,
        /// Successful reconstructions
        reconstructions: u64,
        /// Rejected reconstructions
        rejections: u64,
    },

    /// Presence gate activity
    Gate {
        /// Granted access attempts
        granted: u64,
        /// Denied access attempts
        denied: u64,
        /// Entries in the access log
        log_entries: usize,
        /// Seconds since the presence state was last updated
        presence_age_secs: i64,
    },

    /// Glyph binding activity
    Binding {
        /// Content attachments
        attached: u64,
        /// Successful unlocks
        unlocked: u64,
        /// Key rotations
        rotated: u64,
        /// Resources crypto-shredded
        shredded: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_with_kind_tag() {
        let status = ComponentStatus {
            name: "keystore".to_string(),
            healthy: true,
            stats: ComponentStats::KeyStore {
                backend: "memory".to_string(),
                keys: 2,
            },
        };

        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["stats"]["kind"], "key_store");
        assert_eq!(json["stats"]["keys"], 2);
    }
}
