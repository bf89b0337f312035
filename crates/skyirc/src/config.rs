use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use crate::errors::ServerError;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerSection,
    pub connection: ConnectionSection,
    pub limits: LimitsSection,
    pub user: UserDefaults,
    pub channel: ChannelDefaults,
    pub admin: AdminSection,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerSection {
    /// Server domain name, used as origin prefix of every server reply.
    pub svdomain: String,
    pub is_password_protected: bool,
    /// Any member of the set is accepted by PASS.
    pub server_password: HashSet<String>,
    /// OPER credentials, login -> password.
    pub server_ircop: HashMap<String, String>,
    pub send_motd: bool,
    pub motd_filename: String,
    pub send_stats: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ConnectionSection {
    /// Seconds between two PING challenges.
    pub ping_refresh_delay: u64,
    /// Seconds without a matching PONG before the connection is dropped.
    pub ping_timeout_delay: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LimitsSection {
    pub nb_users_limit: usize,
    pub nb_channels_limit: usize,
    /// Maximum number of channels a single user may join.
    pub nb_join_limit: usize,
    /// Default per-channel user limit.
    pub users_limit_per_channel: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UserDefaults {
    pub is_ircop: bool,
    pub is_receiving_wallops: bool,
    pub is_receiving_notices: bool,
    pub is_invisible: bool,
    pub is_away: bool,
    pub away_message: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChannelDefaults {
    pub is_private: bool,
    pub is_secret: bool,
    pub is_invite_only: bool,
    pub topic_setby_op_only: bool,
    pub no_outside_msg: bool,
    pub is_moderated: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AdminSection {
    pub admin_location_1: String,
    pub admin_location_2: String,
    pub admin_mail: String,
    /// One RPL_INFO line per entry.
    pub server_infos: Vec<String>,
}

impl Config {
    /// Loads and parses the TOML configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ServerError> {
        let path_str = path.as_ref().display().to_string();
        let content = fs::read_to_string(&path).map_err(|source| ServerError::ConfigIo {
            path: path_str.clone(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ServerError::ConfigParse {
            path: path_str,
            source,
        })?;
        Ok(config)
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        ServerSection {
            svdomain: "irc.local".to_string(),
            is_password_protected: false,
            server_password: HashSet::new(),
            server_ircop: HashMap::from([("root".to_string(), "toor".to_string())]),
            send_motd: true,
            motd_filename: "motd.txt".to_string(),
            send_stats: true,
        }
    }
}

impl Default for ConnectionSection {
    fn default() -> Self {
        ConnectionSection {
            ping_refresh_delay: 60,
            ping_timeout_delay: 120,
        }
    }
}

impl Default for LimitsSection {
    fn default() -> Self {
        LimitsSection {
            nb_users_limit: 100,
            nb_channels_limit: 100,
            nb_join_limit: 10,
            users_limit_per_channel: 10,
        }
    }
}

impl Default for UserDefaults {
    fn default() -> Self {
        UserDefaults {
            is_ircop: false,
            is_receiving_wallops: true,
            is_receiving_notices: true,
            is_invisible: false,
            is_away: false,
            away_message: String::new(),
        }
    }
}

impl Default for ChannelDefaults {
    fn default() -> Self {
        ChannelDefaults {
            is_private: false,
            is_secret: false,
            is_invite_only: false,
            topic_setby_op_only: true,
            no_outside_msg: true,
            is_moderated: false,
        }
    }
}

impl Default for AdminSection {
    fn default() -> Self {
        AdminSection {
            admin_location_1: "SkyIRC server".to_string(),
            admin_location_2: "Somewhere on the internet".to_string(),
            admin_mail: "admin@irc.local".to_string(),
            server_infos: vec!["SkyIRC - a small RFC 1459 server".to_string()],
        }
    }
}
