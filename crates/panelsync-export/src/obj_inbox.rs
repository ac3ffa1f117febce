//! OBJ inbox: picks up meshes exported by the CAD side.
//!
//! Watches `Inventor/exports/obj` and, for every new `*.obj` that settles,
//! rewrites `latest_obj.js` in the hot folder root: an import script for the
//! surveying application with the mesh path baked in.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use panelsync_core::config::HotFolderConfig;
use panelsync_core::result::AppResult;
use panelsync_core::types::{ArtifactFormat, StabilityPolicy};
use panelsync_storage::atomic::{is_temp_file, write_atomic_text};
use panelsync_storage::naming::meta_for;
use panelsync_storage::{wait_until_stable, FolderWatcher};

use crate::script::script_path;

/// Stability policy for meshes arriving in the inbox.
pub fn inbox_policy() -> StabilityPolicy {
    StabilityPolicy::from_millis(600, 150, 12_000)
}

/// Import script for `obj` with the path normalized to forward slashes.
pub fn import_script(obj: &Path) -> String {
    let obj = script_path(obj).replace('"', "\\\"");
    format!(
        r#"// Auto-generated by PanelSync

var objPath = "{obj}";

function log(m) {{ try {{ print(m); }} catch (_) {{ }} }}

if (!objPath) {{ throw "objPath is missing!"; }}

log("Importing OBJ: " + objPath);
var rc = SPoly.FromFile(objPath);
if (!rc || rc.ErrorCode !== 0) {{ throw "SPoly.FromFile failed: " + JSON.stringify(rc); }}
if (!rc.PolyTbl || rc.PolyTbl.length === 0) {{ throw "No meshes found in OBJ"; }}

for (var i = 0; i < rc.PolyTbl.length; i++) {{
    var mesh = rc.PolyTbl[i];
    mesh.AddToDoc();
    log("Added mesh: " + mesh.GetName() + " (" + i + ")");
}}

try {{ var vs = SViewSet.New(true); vs.Update(true); }} catch (_) {{ }}
SaveDoc("", true);
log("Saved project after import.");
"#
    )
}

fn is_obj(path: &Path) -> bool {
    !is_temp_file(path) && ArtifactFormat::from_path(path) == Some(ArtifactFormat::Obj)
}

/// Producer-side watcher for exported meshes.
#[derive(Debug, Clone)]
pub struct ObjInbox {
    layout: HotFolderConfig,
    policy: StabilityPolicy,
    in_flight: Arc<DashSet<PathBuf>>,
}

impl ObjInbox {
    pub fn new(layout: HotFolderConfig) -> Self {
        Self::with_policy(layout, inbox_policy())
    }

    pub fn with_policy(layout: HotFolderConfig, policy: StabilityPolicy) -> Self {
        Self {
            layout,
            policy,
            in_flight: Arc::new(DashSet::new()),
        }
    }

    /// Handle one mesh. Returns the script path once it has been written,
    /// or `None` when the mesh never settled.
    pub async fn handle_new_obj(&self, obj: &Path) -> AppResult<Option<PathBuf>> {
        if !wait_until_stable(obj, self.policy).await {
            warn!(path = %obj.display(), "OBJ not stable in time, skipping");
            return Ok(None);
        }

        let meta = meta_for(obj);
        if !wait_until_stable(&meta, self.policy).await {
            warn!(path = %meta.display(), "Sidecar metadata missing or unsettled");
        }

        let script = self.layout.latest_obj_script();
        write_atomic_text(&script, &import_script(obj)).await?;
        info!(
            obj = %obj.display(),
            script = %script.display(),
            "Import script ready, run latest_obj.js in the surveying application"
        );
        Ok(Some(script))
    }

    /// Watch the OBJ folder until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> AppResult<()> {
        let dir = self.layout.obj_dir();
        tokio::fs::create_dir_all(&dir).await?;
        let (_watcher, mut events) = FolderWatcher::watch(&dir, is_obj)?;
        info!(dir = %dir.display(), "OBJ inbox armed");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => {
                    let Some(event) = event else { break };
                    self.dispatch(event.path);
                }
            }
        }
        Ok(())
    }

    fn dispatch(&self, path: PathBuf) {
        if !self.in_flight.insert(path.clone()) {
            debug!(path = %path.display(), "OBJ already being handled");
            return;
        }
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.handle_new_obj(&path).await {
                warn!(path = %path.display(), error = %e, "Failed to write import script");
            }
            this.in_flight.remove(&path);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick() -> StabilityPolicy {
        StabilityPolicy::from_millis(50, 20, 1000)
    }

    #[test]
    fn test_script_embeds_forward_slash_path() {
        let script = import_script(Path::new(r"C:\hot\Inventor\exports\obj\a_P001_rA.obj"));
        assert!(script.contains(r#"var objPath = "C:/hot/Inventor/exports/obj/a_P001_rA.obj";"#));
        assert!(script.contains("SPoly.FromFile(objPath)"));
    }

    #[tokio::test]
    async fn test_writes_latest_script() {
        let dir = tempfile::tempdir().unwrap();
        let layout = HotFolderConfig::at(dir.path());
        std::fs::create_dir_all(layout.obj_dir()).unwrap();
        let obj = layout.obj_dir().join("part_P001_rA.obj");
        std::fs::write(&obj, "v 0 0 0\nf 1 1 1\n").unwrap();
        std::fs::write(meta_for(&obj), "{}").unwrap();

        let inbox = ObjInbox::with_policy(layout.clone(), quick());
        let script = inbox.handle_new_obj(&obj).await.unwrap().unwrap();
        assert_eq!(script, layout.latest_obj_script());
        let body = std::fs::read_to_string(&script).unwrap();
        assert!(body.contains("part_P001_rA.obj"));
    }

    #[tokio::test]
    async fn test_missing_obj_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let layout = HotFolderConfig::at(dir.path());
        let inbox = ObjInbox::with_policy(layout.clone(), quick());

        let written = inbox
            .handle_new_obj(&layout.obj_dir().join("gone.obj"))
            .await
            .unwrap();
        assert!(written.is_none());
        assert!(!layout.latest_obj_script().exists());
    }

    #[test]
    fn test_filter() {
        assert!(is_obj(Path::new("a.OBJ")));
        assert!(!is_obj(Path::new("a.obj.tmp.123")));
        assert!(!is_obj(Path::new("a_meta.json")));
    }
}
