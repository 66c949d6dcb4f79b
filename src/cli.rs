// cli.rs — Command-line interface definitions (clap derive)
//
//   marblemesh coordinator serve   — set the manifest and serve activations
//   marblemesh manifest check      — validate a manifest, print its fingerprint
//   marblemesh platform keygen     — new simulated platform key
//   marblemesh platform profile    — enclave identity matching a marble type
//   marblemesh marble run          — activate, then run the workload

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use marblemesh::config::{DEFAULT_CERT_VALIDITY_HOURS, DEFAULT_LISTEN, DEFAULT_ORGANIZATION};

#[derive(Parser)]
#[command(name = "marblemesh")]
#[command(about = "Attestation-gated admission for confidential workload meshes")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Coordinator commands
    Coordinator {
        #[command(subcommand)]
        action: CoordinatorAction,
    },

    /// Manifest tooling
    Manifest {
        #[command(subcommand)]
        action: ManifestAction,
    },

    /// Simulated attestation platform
    Platform {
        #[command(subcommand)]
        action: PlatformAction,
    },

    /// Workload bootstrap
    Marble {
        #[command(subcommand)]
        action: MarbleAction,
    },
}

#[derive(Subcommand)]
pub enum CoordinatorAction {
    /// Set the manifest and accept marble activations
    Serve {
        /// Path to the manifest JSON
        #[arg(long, env = "EDG_COORDINATOR_MANIFEST")]
        manifest: PathBuf,

        /// Address for the activation service
        #[arg(long, env = "EDG_COORDINATOR_LISTEN", default_value = DEFAULT_LISTEN)]
        listen: String,

        /// Organization written into every certificate
        #[arg(long, default_value = DEFAULT_ORGANIZATION)]
        org: String,

        /// Lifetime of issued marble certificates
        #[arg(long, default_value_t = DEFAULT_CERT_VALIDITY_HOURS)]
        cert_validity_hours: i64,

        /// Existing root certificate (PEM); a fresh root is generated if unset
        #[arg(long, requires = "ca_key")]
        ca_cert: Option<PathBuf>,

        /// Key for --ca-cert (PEM)
        #[arg(long, requires = "ca_cert")]
        ca_key: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ManifestAction {
    /// Validate a manifest and print its fingerprint
    Check {
        /// Path to the manifest JSON
        path: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum PlatformAction {
    /// Generate a platform signing seed and the matching RootCA
    Keygen,

    /// Print the enclave identity that satisfies a marble type's package
    Profile {
        /// Path to the manifest JSON
        #[arg(long)]
        manifest: PathBuf,

        /// Marble type whose package to match
        #[arg(long)]
        marble: String,

        /// Infrastructure whose minimum SVNs to report
        #[arg(long)]
        infrastructure: String,
    },
}

#[derive(Subcommand)]
pub enum MarbleAction {
    /// Activate with the coordinator, then run the workload
    Run {
        /// Enclave identity profile for the simulated platform
        #[arg(long, env = "EDG_PLATFORM_PROFILE")]
        profile: PathBuf,

        /// Directory that manifest file paths are written below
        #[arg(long, default_value = "/")]
        root: PathBuf,

        /// Workload command (everything after --)
        #[arg(last = true, required = true)]
        cmd: Vec<String>,
    },
}
