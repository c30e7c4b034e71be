use crate::config::RemoteConfig;
use crate::{PackageRegistry, RemoteError, USER_AGENT};
use prost::Message;
use protopkg_schema::{CreateOperation, PackageRecord};
use std::io::Read;
use tracing::{debug, info};

/// Path of the create call, relative to the registry base URL.
pub const CREATE_PATH: &str = "/v1/packages:create";

/// Registry client speaking HTTP.
///
/// The create call is a single `POST /v1/packages:create` whose body is the
/// stream of packages, each a length-delimited protobuf message. The
/// registry answers with one JSON `CreateOperation`.
pub struct HttpPackageRegistry {
    config: RemoteConfig,
    agent: ureq::Agent,
}

impl HttpPackageRegistry {
    pub fn new(config: RemoteConfig) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout()))
            .build()
            .into();
        Self { config, agent }
    }

    pub fn url(&self) -> String {
        format!("{}{CREATE_PATH}", self.config.base_url())
    }
}

/// Concatenation of length-delimited package messages.
pub fn encode_package_stream(packages: &[PackageRecord]) -> Vec<u8> {
    let mut body = Vec::new();
    for pkg in packages {
        // Writing into a Vec cannot run out of capacity.
        let _ = pkg.encode_length_delimited(&mut body);
    }
    body
}

/// Inverse of [`encode_package_stream`].
pub fn decode_package_stream(mut data: &[u8]) -> Result<Vec<PackageRecord>, RemoteError> {
    let mut packages = Vec::new();
    while !data.is_empty() {
        let pkg = PackageRecord::decode_length_delimited(&mut data)
            .map_err(|e| RemoteError::Serialization(e.to_string()))?;
        packages.push(pkg);
    }
    Ok(packages)
}

impl PackageRegistry for HttpPackageRegistry {
    fn create_packages(&self, packages: &[PackageRecord]) -> Result<CreateOperation, RemoteError> {
        let url = self.url();
        let body = encode_package_stream(packages);
        debug!("POST {url} ({} packages, {} bytes)", packages.len(), body.len());

        let mut req = self
            .agent
            .post(&url)
            .header("Content-Type", "application/x-protobuf")
            .header("User-Agent", USER_AGENT);
        if let Some(ref token) = self.config.auth_token {
            req = req.header("Authorization", &format!("Bearer {token}"));
        }
        let resp = match req.send(body.as_slice()) {
            Ok(r) => r,
            Err(ureq::Error::StatusCode(404)) => {
                return Err(RemoteError::NotFound(url));
            }
            Err(ureq::Error::StatusCode(code)) => {
                return Err(RemoteError::Http(format!("HTTP {code} for {url}")));
            }
            Err(e) => return Err(RemoteError::Http(e.to_string())),
        };

        let mut data = Vec::new();
        resp.into_body()
            .into_reader()
            .read_to_end(&mut data)
            .map_err(|e| RemoteError::Http(e.to_string()))?;
        let op: CreateOperation = serde_json::from_slice(&data)
            .map_err(|e| RemoteError::Serialization(format!("create operation: {e}")))?;
        if !op.error.is_empty() {
            return Err(RemoteError::Http(format!(
                "registry rejected packages: {}",
                op.error
            )));
        }
        info!("registry accepted {} packages ({})", op.package_count, op.name);
        Ok(op)
    }
}
