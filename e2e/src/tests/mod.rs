//! Test registry - all test cases are registered here

pub mod helpers;

use crate::runner::{TestCase, TestFuture};

/// Build and return all test cases
///
/// Tests are grouped by category. Each test:
/// 1. Optionally queues a mock backend response
/// 2. Sends requests to the REAL proxy
/// 3. Validates what the client got and what the backends saw
pub fn all_tests() -> Vec<TestCase> {
    macro_rules! test {
        ($name:expr, $desc:expr, $func:path) => {
            TestCase {
                name: $name,
                description: $desc,
                run: Box::new(|ctx| -> TestFuture { Box::pin($func(ctx)) }),
            }
        };
    }

    vec![
        // ── Rotation ──────────────────────────────────────────────────────────
        test!(
            "rotation/sequential",
            "Sequential requests alternate between the two replicas",
            basic::test_sequential_rotation
        ),
        test!(
            "rotation/full_cycle",
            "Every cycle visits each replica once, in the same order",
            basic::test_full_cycle_visits_each_backend
        ),
        test!(
            "rotation/concurrent_balanced",
            "Concurrent requests split across replicas within one of each other",
            basic::test_concurrent_requests_balanced
        ),

        // ── Pass-through ──────────────────────────────────────────────────────
        test!(
            "passthrough/request_round_trip",
            "Method, path, query, headers and binary body reach the backend unchanged",
            passthrough::test_request_round_trip
        ),
        test!(
            "passthrough/response_round_trip",
            "Status, headers and binary body reach the client unchanged",
            passthrough::test_response_round_trip
        ),
        test!(
            "passthrough/backend_error",
            "Backend 5xx responses are relayed, not turned into 502",
            passthrough::test_backend_error_passthrough
        ),
        test!(
            "passthrough/redirect",
            "Backend redirects reach the client and are not followed",
            passthrough::test_redirect_passthrough
        ),
        test!(
            "passthrough/no_reserved_routes",
            "/health and other paths are forwarded like any other request",
            passthrough::test_no_reserved_routes
        ),
    ]
}
