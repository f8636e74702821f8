//! Configuration loading and typed config structures for the Kickline agent.
//!
//! The canonical configuration lives in `kickline.yaml` next to the binary.
//! Every field has a default matching the values the agent was tuned with,
//! so an empty (or missing) file yields a playable configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::policy::Role;
use crate::turn_table::{EnemyTable, ResponseCurve};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value parsed but is out of range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level agent configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AgentConfig {
    /// Server address and session timing.
    #[serde(default)]
    pub server: ServerConfig,

    /// Team identity.
    #[serde(default)]
    pub team: TeamConfig,

    /// Turn lookup table parameters.
    #[serde(default)]
    pub lookup: LookupConfig,

    /// Decision policy parameters.
    #[serde(default)]
    pub policy: PolicyConfig,
}

impl AgentConfig {
    /// Load configuration from a YAML file, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] or [`ConfigError::Invalid`].
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Override connection settings from the environment:
    /// - `KICKLINE_HOST` overrides `server.host`
    /// - `KICKLINE_PORT` overrides `server.port`
    /// - `KICKLINE_TEAM` overrides `team.name`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `KICKLINE_PORT` is not a port.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Same as [`apply_env_overrides`](Self::apply_env_overrides) with an
    /// injectable variable source.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the port override is not a port.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("KICKLINE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("KICKLINE_PORT") {
            self.server.port = port.parse().map_err(|e| ConfigError::Invalid {
                reason: format!("KICKLINE_PORT={port}: {e}"),
            })?;
        }
        if let Some(team) = lookup("KICKLINE_TEAM") {
            self.team.name = team;
        }
        Ok(())
    }

    /// Reject values the agent cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lookup.buckets == 0 {
            return Err(invalid("lookup.buckets must be at least 1"));
        }
        if self.team.name.is_empty() || self.team.name.contains(char::is_whitespace) {
            return Err(invalid("team.name must be a single non-empty word"));
        }
        if self.policy.kickable_margin.is_nan() || self.policy.kickable_margin <= 0.0 {
            return Err(invalid("policy.kickable_margin must be positive"));
        }
        if self.policy.kick_spot_offset.is_nan() || self.policy.kick_spot_offset < 0.0 {
            return Err(invalid("policy.kick_spot_offset must not be negative"));
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.to_owned(),
    }
}

/// Server address and session timing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Server host name or address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port the handshake is sent to.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Protocol version announced in the handshake.
    #[serde(default = "default_version")]
    pub version: u32,

    /// How long `connect` waits for the server to answer the handshake.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,

    /// How long `disconnect` waits for each loop before aborting it.
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,
}

impl ServerConfig {
    /// Handshake timeout as a [`Duration`].
    pub const fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Join timeout as a [`Duration`].
    pub const fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            version: default_version(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            join_timeout_ms: default_join_timeout_ms(),
        }
    }
}

/// Team identity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TeamConfig {
    /// Team name sent in the handshake.
    #[serde(default = "default_team_name")]
    pub name: String,
}

impl Default for TeamConfig {
    fn default() -> Self {
        Self {
            name: default_team_name(),
        }
    }
}

/// Turn lookup table parameters.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LookupConfig {
    /// Number of buckets over `[0, 360)`.
    #[serde(default = "default_buckets")]
    pub buckets: usize,

    /// Response curve sampled into the table.
    #[serde(default)]
    pub curve: ResponseCurve,

    /// Table the kick blend uses for enemy directions.
    #[serde(default)]
    pub enemy_table: EnemyTable,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            buckets: default_buckets(),
            curve: ResponseCurve::default(),
            enemy_table: EnemyTable::default(),
        }
    }
}

/// Decision policy parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PolicyConfig {
    /// Uniform number of the designated kick-off taker.
    #[serde(default = "default_kickoff_taker")]
    pub kickoff_taker: u8,

    /// Uniform numbers that take our restarts.
    #[serde(default = "default_restart_takers")]
    pub restart_takers: Vec<u8>,

    /// Server kickable margin in metres.
    #[serde(default = "default_kickable_margin")]
    pub kickable_margin: f64,

    /// Distance behind the ball (away from the goal) of the restart kick spot.
    #[serde(default = "default_kick_spot_offset")]
    pub kick_spot_offset: f64,

    /// Role assignment by uniform number.
    #[serde(default)]
    pub roles: RoleConfig,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            kickoff_taker: default_kickoff_taker(),
            restart_takers: default_restart_takers(),
            kickable_margin: default_kickable_margin(),
            kick_spot_offset: default_kick_spot_offset(),
            roles: RoleConfig::default(),
        }
    }
}

/// Role assignment by uniform number. Numbers not listed play as attackers.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RoleConfig {
    /// Uniform numbers that play as goalie.
    #[serde(default = "default_goalies")]
    pub goalies: Vec<u8>,

    /// Uniform numbers that play as defenders.
    #[serde(default = "default_defenders")]
    pub defenders: Vec<u8>,

    /// Distance from the own goal beyond which a defender retreats.
    #[serde(default = "default_home_radius")]
    pub defender_home_radius: f64,

    /// Distance from the own goal beyond which the goalie retreats.
    #[serde(default = "default_home_radius")]
    pub goalie_home_radius: f64,
}

impl RoleConfig {
    /// The role for `uniform_number`. Goalie assignments win over defender
    /// assignments when a number is listed twice.
    pub fn role_for(&self, uniform_number: u8) -> Role {
        if self.goalies.contains(&uniform_number) {
            Role::Goalie
        } else if self.defenders.contains(&uniform_number) {
            Role::Defender
        } else {
            Role::Attacker
        }
    }

    /// The retreat radius for `role`, if it has one.
    pub const fn home_radius(&self, role: Role) -> Option<f64> {
        match role {
            Role::Attacker => None,
            Role::Defender => Some(self.defender_home_radius),
            Role::Goalie => Some(self.goalie_home_radius),
        }
    }
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            goalies: default_goalies(),
            defenders: default_defenders(),
            defender_home_radius: default_home_radius(),
            goalie_home_radius: default_home_radius(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_host() -> String {
    String::from("localhost")
}

const fn default_port() -> u16 {
    6000
}

const fn default_version() -> u32 {
    11
}

const fn default_handshake_timeout_ms() -> u64 {
    5000
}

const fn default_join_timeout_ms() -> u64 {
    100
}

fn default_team_name() -> String {
    String::from("Keng")
}

const fn default_buckets() -> usize {
    1000
}

const fn default_kickoff_taker() -> u8 {
    3
}

fn default_restart_takers() -> Vec<u8> {
    vec![1, 2, 3, 4]
}

const fn default_kickable_margin() -> f64 {
    0.7
}

const fn default_kick_spot_offset() -> f64 {
    0.5
}

fn default_goalies() -> Vec<u8> {
    vec![3]
}

fn default_defenders() -> Vec<u8> {
    vec![2, 4, 6, 7, 8]
}

const fn default_home_radius() -> f64 {
    15.0
}
