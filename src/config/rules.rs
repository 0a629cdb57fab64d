//! Configuration checks using `Validation`.
//!
//! Every check runs and every violation is reported together, so an
//! operator fixes a broken configuration file in one pass.

use crate::config::error::ConfigViolation;
use crate::config::{FaultPolicy, KioskConfig};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

type Check = Validation<(), NonEmptyVec<ConfigViolation>>;

fn require(ok: bool, violation: ConfigViolation) -> Check {
    if ok {
        Validation::success(())
    } else {
        Validation::fail(violation)
    }
}

/// Run all checks, accumulating every violation.
pub fn check(config: &KioskConfig) -> Check {
    let mut checks: Vec<Check> = vec![
        require(!config.products.is_empty(), ConfigViolation::EmptyCatalogue),
        require(config.history_capacity > 0, ConfigViolation::ZeroHistoryCapacity),
    ];

    for (product, price) in &config.products {
        checks.push(require(
            !product.as_str().trim().is_empty(),
            ConfigViolation::BlankProductId,
        ));
        checks.push(require(
            *price > 0,
            ConfigViolation::ZeroPrice {
                product: product.to_string(),
            },
        ));
    }

    if let FaultPolicy::Codes(codes) = &config.fault_policy {
        checks.push(require(!codes.is_empty(), ConfigViolation::EmptyFatalCodes));
    }

    Validation::all_vec(checks).map(|_| ())
}
