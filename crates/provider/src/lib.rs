pub mod error;
pub mod executor;
pub mod log;
pub mod notifier;
pub mod registry;

pub use error::DependencyError;
pub use executor::Executor;
pub use log::{LogExecutor, LogNotifier};
pub use notifier::Notifier;
pub use registry::{ExecutorRegistry, NotifierRegistry};
