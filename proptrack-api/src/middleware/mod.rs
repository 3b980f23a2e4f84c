/// Tower middleware owned by the API server
///
/// Caller identity lives in `proptrack_shared::auth::middleware` so other
/// binaries can reuse it.

pub mod security;
