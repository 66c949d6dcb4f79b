// manifest/ — Trust policy for the mesh
//
// model.rs     — Typed manifest: packages, infrastructures, marbles, clients
// validate.rs  — Raw JSON → checked Manifest (identity shape, references)
// canonical.rs — Canonical JSON and the manifest fingerprint

pub mod canonical;
pub mod model;
pub mod validate;

pub use model::{
    CpuSvn, Infrastructure, Manifest, MarbleSpec, Measurement, Package, PackageIdentity,
    Parameters,
};
