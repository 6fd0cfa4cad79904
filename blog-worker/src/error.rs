use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum WorkerError {
    #[error("stream bus error")]
    Bus(#[source] blog_bus::BusError),

    #[error("record store error")]
    Store(#[source] blog_store::StoreError),
}

impl From<blog_bus::BusError> for WorkerError {
    fn from(err: blog_bus::BusError) -> Self {
        WorkerError::Bus(err)
    }
}

impl From<blog_store::StoreError> for WorkerError {
    fn from(err: blog_store::StoreError) -> Self {
        WorkerError::Store(err)
    }
}
