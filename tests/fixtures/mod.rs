//! Sample generation requests.

#![allow(dead_code)]

use icon_forge::models::job::GenerationRequest;

/// Phrases the static variation table yields for "toys".
pub const TOY_PHRASES: [&str; 4] = ["Bear Toy", "Car Toy", "Spinner Toy", "Swing Toy"];

pub fn toys_request() -> GenerationRequest {
    GenerationRequest::new("toys", 1, None)
}

pub fn palette_request(colors: &[&str]) -> GenerationRequest {
    GenerationRequest::new(
        "rocket",
        2,
        Some(colors.iter().map(|c| c.to_string()).collect()),
    )
}

/// Distinct prompts for load tests; none are in the static table.
pub fn distinct_requests(count: usize) -> Vec<GenerationRequest> {
    (0..count)
        .map(|i| GenerationRequest::new(format!("lighthouse {i}"), 3, None))
        .collect()
}
