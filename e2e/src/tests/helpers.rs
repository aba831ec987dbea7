//! Common test helpers

use crate::types::ReceivedRequest;

/// Every byte value, repeated up to `len` bytes
pub fn binary_payload(len: usize) -> Vec<u8> {
    (0..=255u8).cycle().take(len).collect()
}

/// Backend names in the order they received requests
pub fn backend_order(reqs: &[ReceivedRequest]) -> Vec<String> {
    reqs.iter().map(|r| r.backend.clone()).collect()
}

pub fn assert_eq_str(actual: &str, expected: &str, label: &str) -> anyhow::Result<()> {
    if actual != expected {
        return Err(anyhow::anyhow!(
            "{} mismatch:\n  expected: {:?}\n  actual:   {:?}",
            label,
            expected,
            actual
        ));
    }
    Ok(())
}

pub fn assert_true(cond: bool, msg: &str) -> anyhow::Result<()> {
    if !cond {
        return Err(anyhow::anyhow!("{}", msg));
    }
    Ok(())
}
