pub mod random;
pub mod seq;

/// Trait for generating short ids.
///
/// Implementations are pure generators that don't interact with storage.
/// Collisions with ids already in the store are detected and retried by
/// the service.
pub trait Generator: Send + Sync + 'static {
    fn generate(&self) -> String;
}
