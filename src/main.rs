// main.rs — marblemesh CLI entry point

mod cli;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use cli::{Cli, Commands, CoordinatorAction, ManifestAction, MarbleAction, PlatformAction};
use marblemesh::config::{CaFiles, CoordinatorConfig, MarbleEnv};
use marblemesh::coordinator::Core;
use marblemesh::manifest::{canonical, Manifest};
use marblemesh::marble::{pre_main, Authenticator, Launch};
use marblemesh::quote::simulated::{identity_for, SimulatedIssuer, SimulatedValidator};
use marblemesh::service::Server;
use marblemesh::{logging, sign};

fn main() -> Result<()> {
    logging::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Coordinator { action } => match action {
            CoordinatorAction::Serve {
                manifest,
                listen,
                org,
                cert_validity_hours,
                ca_cert,
                ca_key,
            } => {
                let ca = match (ca_cert, ca_key) {
                    (Some(cert), Some(key)) => Some(CaFiles { cert, key }),
                    _ => None,
                };
                let config = CoordinatorConfig {
                    organization: org,
                    listen,
                    ca,
                    ..CoordinatorConfig::default()
                }
                .with_validity_hours(cert_validity_hours)?;
                cmd_serve(&manifest, &config)
            }
        },
        Commands::Manifest { action } => match action {
            ManifestAction::Check { path } => cmd_check(&path),
        },
        Commands::Platform { action } => match action {
            PlatformAction::Keygen => cmd_keygen(),
            PlatformAction::Profile {
                manifest,
                marble,
                infrastructure,
            } => cmd_profile(&manifest, &marble, &infrastructure),
        },
        Commands::Marble { action } => match action {
            MarbleAction::Run { profile, root, cmd } => {
                let code = cmd_run(&profile, root, cmd)?;
                std::process::exit(code)
            }
        },
    }
}

fn read_manifest(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading {}", path.display()))
}

fn cmd_serve(manifest_path: &Path, config: &CoordinatorConfig) -> Result<()> {
    let raw = read_manifest(manifest_path)?;
    let ca = config.certificate_authority()?;
    let core = Arc::new(Core::new(ca, SimulatedValidator));
    core.set_manifest(&raw)
        .with_context(|| format!("setting manifest {}", manifest_path.display()))?;

    let server = Server::bind(config.listen.as_str(), Arc::clone(&core))
        .with_context(|| format!("binding {}", config.listen))?;
    server.serve()?;
    Ok(())
}

fn cmd_check(path: &Path) -> Result<()> {
    let manifest = Manifest::from_json(&read_manifest(path)?)
        .with_context(|| format!("checking {}", path.display()))?;
    let fingerprint = canonical::fingerprint(&manifest)?;

    println!("{}", fingerprint);
    eprintln!("Manifest OK:");
    eprintln!("  Packages:        {}", manifest.packages.len());
    eprintln!("  Infrastructures: {}", manifest.infrastructures.len());
    eprintln!("  Marbles:         {}", manifest.marbles.len());
    for (name, spec) in &manifest.marbles {
        let limit = spec
            .activation_limit()
            .map_or_else(|| "unlimited".to_string(), |n| n.to_string());
        eprintln!("    {} (package {}, activations {})", name, spec.package, limit);
    }
    Ok(())
}

fn cmd_keygen() -> Result<()> {
    let (seed, public_key) = sign::keygen();

    println!("{}={}", sign::PLATFORM_KEY_ENV, seed.as_str());
    println!("RootCA: {}", serde_json::to_string(&public_key.to_vec())?);
    eprintln!();
    eprintln!("Keep the seed secret; list RootCA under the infrastructure this platform serves.");
    Ok(())
}

fn cmd_profile(manifest_path: &Path, marble: &str, infrastructure: &str) -> Result<()> {
    let manifest = Manifest::from_json(&read_manifest(manifest_path)?)?;
    let spec = manifest
        .marbles
        .get(marble)
        .ok_or_else(|| anyhow!("marble type {} is not declared", marble))?;
    let package = manifest
        .package_for(spec)
        .ok_or_else(|| anyhow!("package {} is not declared", spec.package))?;
    let infra = manifest
        .infrastructures
        .get(infrastructure)
        .ok_or_else(|| anyhow!("infrastructure {} is not declared", infrastructure))?;

    println!(
        "{}",
        serde_json::to_string_pretty(&identity_for(package, infra))?
    );
    Ok(())
}

fn cmd_run(profile: &Path, root: PathBuf, cmd: Vec<String>) -> Result<i32> {
    let mut cmd = cmd.into_iter();
    let Some(program) = cmd.next() else {
        bail!("no workload command given");
    };

    let env = MarbleEnv::from_env()?;
    let issuer = SimulatedIssuer::from_profile(profile)
        .with_context(|| format!("loading platform profile {}", profile.display()))?;
    let auth = Authenticator::new(&env.marble_type, &issuer)?;
    let identity = pre_main(&auth, &env)
        .with_context(|| format!("activating {} with {}", env.marble_type, env.coordinator_addr))?;

    let launch = Launch::new(root, program, cmd.map(Into::into).collect());
    Ok(launch.run(&identity)?)
}
