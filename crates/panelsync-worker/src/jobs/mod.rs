//! Built-in job handler implementations.

pub mod export_obj;
pub mod import_iges;

use std::sync::Arc;

use panelsync_core::config::WatcherConfig;
use panelsync_core::traits::HostApplication;

use crate::executor::JobExecutor;

pub use export_obj::ExportObjHandler;
pub use import_iges::ImportIgesHandler;

/// Executor with both built-in handlers bound to `host`.
pub fn standard_executor(host: Arc<dyn HostApplication>, config: &WatcherConfig) -> JobExecutor {
    let mut executor = JobExecutor::new();
    executor.register(Arc::new(ImportIgesHandler::new(
        host.clone(),
        config.artifact_policy(),
        config.import_units,
    )));
    executor.register(Arc::new(ExportObjHandler::new(host, config.mesh.clone())));
    executor
}
