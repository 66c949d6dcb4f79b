// policy.rs — Compare a parsed attestation report with the manifest
//
// Order of checks: report data, package identity, debug mode, then the
// infrastructure's platform SVNs. The first failure is returned; callers log
// it and surface only `QuoteInvalid`.

use serde::{Deserialize, Serialize};

use crate::error::QuoteMismatch;
use crate::manifest::{CpuSvn, Infrastructure, Measurement, Package, PackageIdentity};

/// What an enclave measures as, independent of the data it attests to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnclaveIdentity {
    pub unique_id: Measurement,
    pub signer_id: Measurement,
    pub product_id: u16,
    pub security_version: u16,
    pub debug: bool,
    pub qe_svn: u16,
    pub pce_svn: u16,
    pub cpu_svn: CpuSvn,
}

/// Values a validator extracted from a verified quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub identity: EnclaveIdentity,
    pub report_data: Vec<u8>,
}

/// Check a verified report against the expected report data, a package and
/// an infrastructure.
pub fn check_report(
    report: &Report,
    report_data: &[u8],
    package: &Package,
    infrastructure: &Infrastructure,
) -> Result<(), QuoteMismatch> {
    if report.report_data != report_data {
        return Err(QuoteMismatch::ReportData);
    }

    let id = &report.identity;
    match &package.identity {
        PackageIdentity::Unique { unique_id } => {
            if &id.unique_id != unique_id {
                return Err(QuoteMismatch::UniqueId);
            }
        }
        PackageIdentity::Signer {
            signer_id,
            product_id,
            security_version,
        } => {
            if &id.signer_id != signer_id {
                return Err(QuoteMismatch::SignerId);
            }
            if id.product_id != *product_id {
                return Err(QuoteMismatch::ProductId {
                    expected: *product_id,
                    actual: id.product_id,
                });
            }
            if id.security_version < *security_version {
                return Err(QuoteMismatch::SecurityVersion {
                    required: *security_version,
                    actual: id.security_version,
                });
            }
        }
    }

    if id.debug && !package.debug {
        return Err(QuoteMismatch::Debug);
    }

    if id.qe_svn < infrastructure.qe_svn {
        return Err(QuoteMismatch::QeSvn {
            required: infrastructure.qe_svn,
            actual: id.qe_svn,
        });
    }
    if id.pce_svn < infrastructure.pce_svn {
        return Err(QuoteMismatch::PceSvn {
            required: infrastructure.pce_svn,
            actual: id.pce_svn,
        });
    }
    for (index, (&actual, &required)) in id
        .cpu_svn
        .iter()
        .zip(infrastructure.cpu_svn.iter())
        .enumerate()
    {
        if actual < required {
            return Err(QuoteMismatch::CpuSvn {
                index,
                required,
                actual,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn infra() -> Infrastructure {
        Infrastructure {
            qe_svn: 2,
            pce_svn: 3,
            cpu_svn: [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15],
            root_ca: vec![],
        }
    }

    fn signer_package(debug: bool) -> Package {
        Package {
            identity: PackageIdentity::Signer {
                signer_id: [7; 32],
                product_id: 44,
                security_version: 3,
            },
            debug,
        }
    }

    fn report() -> Report {
        Report {
            identity: EnclaveIdentity {
                unique_id: [1; 32],
                signer_id: [7; 32],
                product_id: 44,
                security_version: 3,
                debug: false,
                qe_svn: 2,
                pce_svn: 3,
                cpu_svn: infra().cpu_svn,
            },
            report_data: vec![0xAB; 32],
        }
    }

    fn check(r: &Report, pkg: &Package) -> Result<(), QuoteMismatch> {
        check_report(r, &[0xAB; 32], pkg, &infra())
    }

    #[test]
    fn accepts_exact_minimums() {
        check(&report(), &signer_package(false)).unwrap();
    }

    #[test]
    fn security_version_below_minimum_is_rejected() {
        let mut r = report();
        r.identity.security_version = 2;
        assert_eq!(
            check(&r, &signer_package(false)),
            Err(QuoteMismatch::SecurityVersion {
                required: 3,
                actual: 2
            })
        );
        r.identity.security_version = 9;
        check(&r, &signer_package(false)).unwrap();
    }

    #[test]
    fn signer_and_product_must_match() {
        let mut r = report();
        r.identity.signer_id = [8; 32];
        assert_eq!(check(&r, &signer_package(false)), Err(QuoteMismatch::SignerId));

        let mut r = report();
        r.identity.product_id = 45;
        assert!(matches!(
            check(&r, &signer_package(false)),
            Err(QuoteMismatch::ProductId { .. })
        ));
    }

    #[test]
    fn unique_id_must_match_exactly() {
        let pkg = Package {
            identity: PackageIdentity::Unique { unique_id: [1; 32] },
            debug: false,
        };
        check(&report(), &pkg).unwrap();

        let mut r = report();
        r.identity.unique_id[31] ^= 1;
        assert_eq!(check(&r, &pkg), Err(QuoteMismatch::UniqueId));
    }

    #[test]
    fn single_low_cpu_svn_byte_is_rejected() {
        let mut r = report();
        // Every byte above the minimum except one.
        for b in r.identity.cpu_svn.iter_mut() {
            *b += 10;
        }
        r.identity.cpu_svn[7] = 6;
        assert_eq!(
            check(&r, &signer_package(false)),
            Err(QuoteMismatch::CpuSvn {
                index: 7,
                required: 7,
                actual: 6
            })
        );
    }

    #[test]
    fn platform_svns_are_minimums() {
        let mut r = report();
        r.identity.qe_svn = 1;
        assert!(matches!(
            check(&r, &signer_package(false)),
            Err(QuoteMismatch::QeSvn { .. })
        ));

        let mut r = report();
        r.identity.pce_svn = 2;
        assert!(matches!(
            check(&r, &signer_package(false)),
            Err(QuoteMismatch::PceSvn { .. })
        ));
    }

    #[test]
    fn debug_enclave_needs_debug_package() {
        let mut r = report();
        r.identity.debug = true;
        assert_eq!(check(&r, &signer_package(false)), Err(QuoteMismatch::Debug));
        check(&r, &signer_package(true)).unwrap();
        // A debug package still accepts a production enclave.
        check(&report(), &signer_package(true)).unwrap();
    }

    #[test]
    fn report_data_must_match() {
        assert_eq!(
            check_report(&report(), &[0xAC; 32], &signer_package(false), &infra()),
            Err(QuoteMismatch::ReportData)
        );
    }
}
