use crate::validation::ValidationError;
use tonic::Status;

pub fn validation_status(err: ValidationError) -> Status {
    Status::invalid_argument(err.0)
}

pub fn not_found(message: &str) -> Status {
    Status::not_found(message)
}

/// Store errors are opaque failures from the caller's perspective; surfaced
/// as a coarse "unavailable" per the facade's error propagation policy.
pub fn store_status(err: blog_store::StoreError) -> Status {
    Status::unavailable(err.to_string())
}

pub fn bus_status(err: blog_bus::BusError) -> Status {
    Status::unavailable(err.to_string())
}
