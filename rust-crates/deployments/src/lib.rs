use anyhow::{
    Context,
    Result,
};
use chrono::Utc;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    fs,
    io,
    path::{
        Path,
        PathBuf,
    },
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployments.json";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeploymentEnv {
    Local,
    Sepolia,
}

impl DeploymentEnv {
    pub fn dir_name(self) -> &'static str {
        match self {
            DeploymentEnv::Local => "local",
            DeploymentEnv::Sepolia => "sepolia",
        }
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentEnv::Local => "Local",
            DeploymentEnv::Sepolia => "Sepolia",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentRecord {
    pub recorded_at: String,
    pub raffle_address: String,
    pub network_url: String,
    #[serde(default)]
    pub airdrop_address: Option<String>,
    #[serde(default)]
    pub eligibility_url: Option<String>,
    #[serde(default)]
    pub deployment_block: Option<u64>,
}

/// One deployment record per network, kept at `<root>/<env>/deployments.json`.
#[derive(Debug)]
pub struct DeploymentStore {
    path: PathBuf,
}

impl DeploymentStore {
    pub fn new(env: DeploymentEnv) -> Self {
        Self::new_in(DEPLOYMENTS_ROOT, env)
    }

    pub fn new_in(root: impl AsRef<Path>, env: DeploymentEnv) -> Self {
        let path = root.as_ref().join(env.dir_name()).join(DEPLOYMENTS_FILE);
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` until a deployment has been recorded.
    pub fn load(&self) -> Result<Option<DeploymentRecord>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("reading deployment record {}", self.path.display())
                });
            }
        };
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let record = serde_json::from_slice(&data).with_context(|| {
            format!("parsing deployment record {}", self.path.display())
        })?;
        Ok(Some(record))
    }

    pub fn save(&self, record: &DeploymentRecord) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating deployments directory {}", dir.display()))?;
        }
        let json = serde_json::to_vec_pretty(record)
            .context("serializing deployment record")?;
        fs::write(&self.path, json)
            .with_context(|| format!("writing deployment record {}", self.path.display()))
    }
}

pub fn record_deployment(
    store: &DeploymentStore,
    raffle_address: impl AsRef<str>,
    network_url: impl AsRef<str>,
    airdrop_address: Option<impl AsRef<str>>,
    eligibility_url: Option<impl AsRef<str>>,
    deployment_block: Option<u64>,
) -> Result<DeploymentRecord> {
    let record = DeploymentRecord {
        recorded_at: Utc::now().to_rfc3339(),
        raffle_address: raffle_address.as_ref().to_string(),
        network_url: network_url.as_ref().to_string(),
        airdrop_address: airdrop_address.map(|a| a.as_ref().to_string()),
        eligibility_url: eligibility_url.map(|u| u.as_ref().to_string()),
        deployment_block,
    };
    store.save(&record)?;
    Ok(record)
}
