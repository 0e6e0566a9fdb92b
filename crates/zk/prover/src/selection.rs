use weisyn_types::state_output::{Curve, ProvingScheme};

/// Scheme/curve recommendation by compiled constraint count. An explicitly
/// registered circuit always wins over this policy.
pub fn select_scheme(constraint_count: u64) -> (ProvingScheme, Curve) {
    if constraint_count < 1_000 {
        (ProvingScheme::Groth16, Curve::Bn254)
    } else if constraint_count <= 10_000 {
        (ProvingScheme::Plonk, Curve::Bn254)
    } else {
        (ProvingScheme::Plonk, Curve::Bls12_377)
    }
}
