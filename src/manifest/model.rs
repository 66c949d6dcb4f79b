use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 32-byte enclave measurement (MRENCLAVE / MRSIGNER).
pub type Measurement = [u8; 32];

/// 16-byte CPU security version vector.
pub type CpuSvn = [u8; 16];

// ── Manifest ────────────────────────────────────────────────────────────────

/// Trust policy for a mesh. Built only through [`Manifest::from_json`], which
/// checks package identities and marble references before anything can hold
/// one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Manifest {
    pub packages: BTreeMap<String, Package>,
    pub infrastructures: BTreeMap<String, Infrastructure>,
    pub marbles: BTreeMap<String, MarbleSpec>,
    pub clients: BTreeMap<String, Vec<u8>>,
}

// ── Packages ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "PackageDoc")]
pub struct Package {
    pub identity: PackageIdentity,
    /// Accept quotes from debug-mode enclaves. Never implied.
    pub debug: bool,
}

/// How a package is recognised in a quote. Exactly one shape per package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageIdentity {
    /// Exact enclave measurement.
    Unique { unique_id: Measurement },
    /// Signing authority plus product line and a minimum security version.
    Signer {
        signer_id: Measurement,
        product_id: u16,
        security_version: u16,
    },
}

/// JSON shape of a package: both identity shapes as optional fields.
/// Converting to [`Package`] rejects anything but exactly one shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PackageDoc {
    #[serde(rename = "UniqueID", default, skip_serializing_if = "Option::is_none")]
    pub unique_id: Option<Measurement>,
    #[serde(rename = "SignerID", default, skip_serializing_if = "Option::is_none")]
    pub signer_id: Option<Measurement>,
    #[serde(rename = "ProductID", default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<u16>,
    #[serde(
        rename = "SecurityVersion",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub security_version: Option<u16>,
    #[serde(rename = "Debug", default)]
    pub debug: bool,
}

impl From<Package> for PackageDoc {
    fn from(pkg: Package) -> Self {
        match pkg.identity {
            PackageIdentity::Unique { unique_id } => PackageDoc {
                unique_id: Some(unique_id),
                debug: pkg.debug,
                ..Default::default()
            },
            PackageIdentity::Signer {
                signer_id,
                product_id,
                security_version,
            } => PackageDoc {
                signer_id: Some(signer_id),
                product_id: Some(product_id),
                security_version: Some(security_version),
                debug: pkg.debug,
                ..Default::default()
            },
        }
    }
}

impl TryFrom<PackageDoc> for Package {
    type Error = String;

    fn try_from(doc: PackageDoc) -> Result<Self, Self::Error> {
        let identity = match (doc.unique_id, doc.signer_id) {
            (Some(_), Some(_)) => {
                return Err("sets both UniqueID and SignerID".to_string());
            }
            (None, None) => {
                return Err("sets neither UniqueID nor SignerID".to_string());
            }
            (Some(unique_id), None) => {
                if doc.product_id.is_some() || doc.security_version.is_some() {
                    return Err(
                        "ProductID/SecurityVersion only apply to SignerID packages".to_string()
                    );
                }
                PackageIdentity::Unique { unique_id }
            }
            (None, Some(signer_id)) => PackageIdentity::Signer {
                signer_id,
                product_id: doc
                    .product_id
                    .ok_or_else(|| "SignerID package is missing ProductID".to_string())?,
                security_version: doc
                    .security_version
                    .ok_or_else(|| "SignerID package is missing SecurityVersion".to_string())?,
            },
        };
        Ok(Package {
            identity,
            debug: doc.debug,
        })
    }
}

// ── Infrastructures ─────────────────────────────────────────────────────────

/// Minimum platform security versions plus the root of trust a validator
/// uses for quotes from this infrastructure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Infrastructure {
    #[serde(rename = "QESVN")]
    pub qe_svn: u16,
    #[serde(rename = "PCESVN")]
    pub pce_svn: u16,
    #[serde(rename = "CPUSVN")]
    pub cpu_svn: CpuSvn,
    #[serde(rename = "RootCA")]
    pub root_ca: Vec<u8>,
}

// ── Marbles ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct MarbleSpec {
    pub package: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_activations: Option<u64>,
    #[serde(default)]
    pub parameters: Parameters,
}

impl MarbleSpec {
    /// Activation cap; `None` when absent or zero.
    pub fn activation_limit(&self) -> Option<u64> {
        self.max_activations.filter(|&n| n > 0)
    }
}

/// Runtime configuration handed to an activated marble, verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct Parameters {
    #[serde(default)]
    pub files: BTreeMap<String, Vec<u8>>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub argv: Vec<String>,
}
