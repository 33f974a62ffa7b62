//! Static safe-range checks.
//!
//! Every call re-evaluates from scratch: there is no hysteresis and no
//! suppression, so a value that stays out of range alerts on every ingress.

use crate::domain::{Parameter, SafeRange};

/// one out-of-range finding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breach {
    pub parameter: Parameter,
    pub value: f64,
    pub range: SafeRange,
}

/// Returns one breach per parameter whose value falls outside its inclusive
/// safe range, in `Parameter::ALL` order.
pub fn check<I>(values: I) -> Vec<Breach>
where
    I: IntoIterator<Item = (Parameter, f64)>,
{
    let mut breaches: Vec<Breach> = values
        .into_iter()
        .filter_map(|(parameter, value)| {
            let range = parameter.safe_range();
            (!range.contains(value)).then_some(Breach {
                parameter,
                value,
                range,
            })
        })
        .collect();
    breaches.sort_by_key(|b| Parameter::ALL.iter().position(|p| *p == b.parameter));
    breaches
}
