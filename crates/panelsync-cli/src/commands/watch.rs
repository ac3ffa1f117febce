//! OBJ inbox watcher command.

use crate::output;
use panelsync_core::config::AppConfig;
use panelsync_core::error::AppError;
use panelsync_export::ObjInbox;

/// Run the OBJ inbox until Ctrl-C.
pub async fn execute(config: &AppConfig) -> Result<(), AppError> {
    let inbox = ObjInbox::new(config.hot_folder.clone());
    output::print_kv("Watching", &config.hot_folder.obj_dir().display().to_string());
    output::print_kv("Script", &config.hot_folder.latest_obj_script().display().to_string());

    inbox.run(super::ctrl_c_token()).await?;
    output::print_success("OBJ inbox stopped");
    Ok(())
}
