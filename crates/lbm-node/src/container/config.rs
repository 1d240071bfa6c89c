//! Environment-derived node settings (§5 environment contract).

use std::path::PathBuf;

/// Tunable knobs for one node process, read once at startup.
#[derive(Debug, Clone)]
pub struct NodeSettings {
    /// Root directory for every on-disk artifact (keys, cas, wal, groups,
    /// peers/subscriptions). `LB_DATA_DIR`.
    pub data_dir: PathBuf,
    /// `tracing_subscriber::EnvFilter` syntax. `LB_LOG_LEVEL`.
    pub log_level: String,
    /// Optional directory to additionally tee logs into
    /// (`<LB_LOG_DIR>/lbm-node.log`). `LB_LOG_DIR`.
    pub log_dir: Option<PathBuf>,
    /// TCP address the P2P server binds. `LB_P2P_BIND`.
    pub p2p_bind: String,
    /// Maximum accepted CAS object size, in bytes.
    pub cas_max_object_size: u64,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./lbm-data"),
            log_level: "info".to_string(),
            log_dir: None,
            p2p_bind: "0.0.0.0:7676".to_string(),
            cas_max_object_size: lbm_types::DEFAULT_MAX_OBJECT_SIZE,
        }
    }
}

impl NodeSettings {
    /// Read settings from the process environment, falling back to defaults
    /// for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: std::env::var("LB_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            log_level: std::env::var("LB_LOG_LEVEL").unwrap_or(defaults.log_level),
            log_dir: std::env::var("LB_LOG_DIR").ok().map(PathBuf::from),
            p2p_bind: std::env::var("LB_P2P_BIND").unwrap_or(defaults.p2p_bind),
            cas_max_object_size: defaults.cas_max_object_size,
        }
    }

    /// `<data_dir>/keys`.
    pub fn keys_dir(&self) -> PathBuf {
        self.data_dir.join("keys")
    }

    /// `<data_dir>/cas`.
    pub fn cas_dir(&self) -> PathBuf {
        self.data_dir.join("cas")
    }

    /// `<data_dir>/wal`.
    pub fn wal_dir(&self) -> PathBuf {
        self.data_dir.join("wal")
    }

    /// `<data_dir>/groups`.
    pub fn groups_dir(&self) -> PathBuf {
        self.data_dir.join("groups")
    }

    /// `<data_dir>/groups/<group_id>`.
    pub fn group_dir(&self, group_id: &str) -> PathBuf {
        self.groups_dir().join(group_id)
    }

    /// `<data_dir>/peers.json`.
    pub fn peers_path(&self) -> PathBuf {
        self.data_dir.join("peers.json")
    }

    /// `<data_dir>/subscriptions.json`.
    pub fn subscriptions_path(&self) -> PathBuf {
        self.data_dir.join("subscriptions.json")
    }
}
