use serde::Deserialize;

/// Per-service settings, loaded from a JSON file named on the command line.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    #[serde(default)]
    pub paths: Vec<RootSettings>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_threads")]
    pub threads: usize,
    #[serde(default = "default_scan_interval")]
    pub scan_interval: u64,
    #[serde(default = "default_logpath")]
    pub logpath: String,
    #[serde(default = "default_loglevel")]
    pub loglevel: String,
    #[serde(default = "default_cache_path")]
    pub cache_path: String,
    /// Gateway addresses the agent announces itself to.
    #[serde(default)]
    pub registry_address: Vec<String>,
    /// The `host:port` this agent advertises. Interface enumeration is not
    /// performed; announcing is skipped when this is unset.
    #[serde(default)]
    pub registry_agent_address: Option<String>,
    #[serde(default)]
    pub agent_interface_names: Option<String>,
    #[serde(default)]
    pub agent_ip_patterns: Option<String>,
}

/// One configured log root.
#[derive(Debug, Clone, Deserialize)]
pub struct RootSettings {
    pub path: String,
    #[serde(default)]
    pub namepattern: Option<String>,
    #[serde(default)]
    pub pathpattern: Option<String>,
    #[serde(default)]
    pub prefixpattern: Option<String>,
    #[serde(default)]
    pub time_format_pattern: Option<String>,
    #[serde(default = "default_max_days")]
    pub maxdays: u32,
}

fn default_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8113
}

fn default_threads() -> usize {
    1
}

fn default_scan_interval() -> u64 {
    60
}

fn default_logpath() -> String {
    "logs/".to_string()
}

fn default_loglevel() -> String {
    "info".to_string()
}

fn default_cache_path() -> String {
    "cache/".to_string()
}

fn default_max_days() -> u32 {
    30
}

pub fn load_settings(config_path: &str) -> Result<Settings, config::ConfigError> {
    let settings: Settings = config::Config::builder()
        .add_source(config::File::with_name(config_path))
        .build()?
        .try_deserialize()?;

    Ok(settings)
}
