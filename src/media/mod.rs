pub mod lifecycle;

pub use lifecycle::MediaLifecycleManager;
