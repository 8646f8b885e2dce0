use crate::apply::{ChangeApplier, MutationSerializer};
use crate::error::Error;
use crate::record_store::{CachedRecordStore, DirectoryStore, DynRecordStore};
use crate::reload::{CommandReloader, DynReloader};
use ipnetwork::IpNetwork;
use lazy_static::lazy_static;
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};
use std::fs::File;
use std::io::BufReader;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub type SharedConfig = Arc<Config>;

/// Media type of every external-dns webhook request and response body.
pub const WEBHOOK_MEDIA_TYPE: &str = "application/external.dns.webhook+json;version=1";

#[serde_as]
#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    pub domain_filter: Vec<String>,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: SocketAddr,
    #[serde(default = "default_health_bind_addr")]
    pub health_bind_addr: SocketAddr,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_api_timeout")]
    pub api_timeout: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: Duration,
    #[serde(default = "default_dns_ttl")]
    pub dns_ttl: u32,
    #[serde(default = "default_dnsmasq_dir")]
    pub dnsmasq_dir: PathBuf,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_reload_command")]
    pub reload_command: String,
    #[serde(default)]
    pub record_cache: bool,
    #[serde(default = "default_acl")]
    pub acl: Vec<IpNetwork>,
}

lazy_static! {
    // Loopback plus the RFC 1918 and RFC 4193 private ranges. The webhook is meant to be reached
    // from the local network only unless an explicit ACL says otherwise.
    static ref PRIVATE_NETWORKS: Vec<IpNetwork> = [
        "127.0.0.0/8",
        "10.0.0.0/8",
        "172.16.0.0/12",
        "192.168.0.0/16",
        "::1/128",
        "fc00::/7",
    ]
    .iter()
    .map(|net| IpNetwork::from_str(net).unwrap())
    .collect();
}

fn default_api_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8888))
}

fn default_health_bind_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

fn default_api_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_dns_ttl() -> u32 {
    300
}

fn default_dnsmasq_dir() -> PathBuf {
    PathBuf::from("/home/pi/.firewalla/config/dnsmasq_local")
}

fn default_reload_command() -> String {
    "sudo systemctl restart firerouter_dns".to_string()
}

fn default_acl() -> Vec<IpNetwork> {
    PRIVATE_NETWORKS.clone()
}

impl Config {
    /// Load and validate a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] if the file can't be read, [`Error::InvalidJSON`] if it doesn't
    /// parse, or [`Error::Config`] if a setting is unusable.
    pub fn try_from_file(p: impl AsRef<Path>) -> Result<Self, Error> {
        let f = File::open(p)?;
        let reader = BufReader::new(f);
        let conf: Config = serde_json::from_reader(reader)?;
        conf.validated()
    }

    /// Load and validate a config from a JSON string.
    ///
    /// # Errors
    ///
    /// See [`Config::try_from_file`].
    pub fn try_from_json(json: &str) -> Result<Self, Error> {
        let conf: Config = serde_json::from_str(json)?;
        conf.validated()
    }

    fn validated(mut self) -> Result<Self, Error> {
        self.domain_filter = self
            .domain_filter
            .iter()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();
        if self.domain_filter.is_empty() {
            return Err(Error::Config(
                "domain_filter must contain at least one domain".to_string(),
            ));
        }
        if self.reload_command.trim().is_empty() {
            return Err(Error::Config("reload_command must not be empty".to_string()));
        }
        Ok(self)
    }

    pub fn request_permitted(&self, source_ip: IpAddr) -> bool {
        // Dual-stack listeners report IPv4 clients as IPv4-mapped IPv6 addresses.
        let source_ip = match source_ip {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(source_ip, IpAddr::V4),
            IpAddr::V4(_) => source_ip,
        };
        self.acl.iter().any(|network| network.contains(source_ip))
    }

    /// Open the managed directory as a record store, wrapped in a listing cache when
    /// [`Config::record_cache`] is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IO`] if the managed directory can't be created.
    pub async fn record_store(&self) -> Result<DynRecordStore, Error> {
        let directory: DynRecordStore = Arc::new(
            DirectoryStore::open(&self.dnsmasq_dir, self.dns_ttl, self.dry_run).await?,
        );
        if self.record_cache {
            return Ok(Arc::new(CachedRecordStore::new(directory)));
        }
        Ok(directory)
    }

    pub fn reloader(&self) -> DynReloader {
        Arc::new(CommandReloader::new(&self.reload_command, self.dry_run))
    }

    /// Start the worker that applies change-sets against `store`.
    pub fn serializer(&self, store: DynRecordStore) -> MutationSerializer {
        MutationSerializer::spawn(ChangeApplier::new(store, self.reloader()))
    }
}
