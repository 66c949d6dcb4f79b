// launch.rs — Hand control to the workload
//
// Files from the manifest are written below `root` (absolute manifest paths
// are taken relative to it). The workload runs as a child process with the
// manifest Env, the marble's PEM material, and the manifest Argv appended to
// its own arguments.

use std::ffi::OsString;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::BootstrapError;
use crate::manifest::Parameters;
use crate::marble::premain::MarbleIdentity;

pub const MARBLE_CERT_ENV: &str = "EDG_MARBLE_CERT";
pub const MARBLE_KEY_ENV: &str = "EDG_MARBLE_KEY";
pub const ROOT_CA_ENV: &str = "EDG_ROOT_CA";

pub struct Launch {
    root: PathBuf,
    program: OsString,
    args: Vec<OsString>,
}

impl Launch {
    pub fn new(
        root: impl Into<PathBuf>,
        program: impl Into<OsString>,
        args: Vec<OsString>,
    ) -> Self {
        Self {
            root: root.into(),
            program: program.into(),
            args,
        }
    }

    /// Write every manifest file below the root. Returns the written paths.
    pub fn install_files(&self, params: &Parameters) -> Result<Vec<PathBuf>, BootstrapError> {
        let mut written = Vec::with_capacity(params.files.len());
        for (name, data) in &params.files {
            let path = resolve(&self.root, name)?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| install_error(parent, e))?;
            }
            fs::write(&path, data).map_err(|e| install_error(&path, e))?;
            debug!(path = %path.display(), bytes = data.len(), "installed file");
            written.push(path);
        }
        Ok(written)
    }

    /// The workload command, ready to spawn.
    pub fn command(&self, identity: &MarbleIdentity) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .args(&identity.parameters.argv)
            .envs(&identity.parameters.env)
            .env(MARBLE_CERT_ENV, identity.certificate_pem())
            .env(MARBLE_KEY_ENV, identity.private_key_pem.as_str())
            .env(ROOT_CA_ENV, identity.root_ca_pem());
        cmd
    }

    /// Install files, run the workload, and return its exit code.
    pub fn run(&self, identity: &MarbleIdentity) -> Result<i32, BootstrapError> {
        self.install_files(&identity.parameters)?;
        info!(
            program = %Path::new(&self.program).display(),
            common_name = %identity.common_name,
            "starting workload"
        );
        let status = self
            .command(identity)
            .status()
            .map_err(|e| BootstrapError::Install(format!("spawning workload: {}", e)))?;
        Ok(status.code().unwrap_or(1))
    }
}

fn install_error(path: &Path, e: std::io::Error) -> BootstrapError {
    BootstrapError::Install(format!("{}: {}", path.display(), e))
}

/// Place a manifest path below `root`, refusing `..` and empty paths.
fn resolve(root: &Path, name: &str) -> Result<PathBuf, BootstrapError> {
    let mut path = root.to_path_buf();
    let mut depth = 0;
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => {
                path.push(part);
                depth += 1;
            }
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir | Component::Prefix(_) => {
                return Err(BootstrapError::Install(format!(
                    "file path {} escapes the root",
                    name
                )))
            }
        }
    }
    if depth == 0 {
        return Err(BootstrapError::Install(format!("empty file path {:?}", name)));
    }
    Ok(path)
}
