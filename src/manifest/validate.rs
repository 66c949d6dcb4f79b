// validate.rs — Parse raw manifest bytes into a checked `Manifest`
//
// Two passes: serde into the JSON shape, then conversion that enforces the
// package identity shape and marble → package references. A manifest that
// fails either pass never reaches the admission engine.

use serde::Deserialize;
use std::collections::BTreeMap;

use crate::error::ManifestError;
use crate::manifest::model::*;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct ManifestDoc {
    #[serde(default)]
    packages: BTreeMap<String, PackageDoc>,
    #[serde(default)]
    infrastructures: BTreeMap<String, Infrastructure>,
    #[serde(default)]
    marbles: BTreeMap<String, MarbleSpec>,
    #[serde(default)]
    clients: BTreeMap<String, Vec<u8>>,
}

impl Manifest {
    /// Parse and check a manifest.
    pub fn from_json(raw: &[u8]) -> Result<Self, ManifestError> {
        let doc: ManifestDoc = serde_json::from_slice(raw)?;
        doc.into_manifest()
    }

    /// Package referenced by a marble spec.
    pub fn package_for(&self, marble: &MarbleSpec) -> Option<&Package> {
        self.packages.get(&marble.package)
    }
}

impl ManifestDoc {
    fn into_manifest(self) -> Result<Manifest, ManifestError> {
        check_names("Packages", self.packages.keys())?;
        check_names("Infrastructures", self.infrastructures.keys())?;
        check_names("Marbles", self.marbles.keys())?;
        check_names("Clients", self.clients.keys())?;

        let mut packages = BTreeMap::new();
        for (name, doc) in self.packages {
            let pkg = Package::try_from(doc).map_err(|reason| ManifestError::PackageIdentity {
                package: name.clone(),
                reason,
            })?;
            packages.insert(name, pkg);
        }

        for (name, marble) in &self.marbles {
            if !packages.contains_key(&marble.package) {
                return Err(ManifestError::DanglingPackage {
                    marble: name.clone(),
                    package: marble.package.clone(),
                });
            }
        }

        Ok(Manifest {
            packages,
            infrastructures: self.infrastructures,
            marbles: self.marbles,
            clients: self.clients,
        })
    }
}

fn check_names<'a>(
    section: &'static str,
    mut names: impl Iterator<Item = &'a String>,
) -> Result<(), ManifestError> {
    if names.any(|n| n.trim().is_empty()) {
        return Err(ManifestError::EmptyName(section));
    }
    Ok(())
}
