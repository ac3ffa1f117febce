//! End-to-end hot folder handoff: producer enqueues, agent executes.

mod helpers;

use std::path::PathBuf;

use panelsync_core::traits::{MeasurementUnit, TemplateKind};
use panelsync_core::types::{Job, PanelMeta, StabilityPolicy};
use panelsync_export::{ObjInbox, ReferenceExportPipeline};
use panelsync_storage::naming::meta_for;
use panelsync_worker::sim_host::HostCall;

use helpers::TestHotFolder;

fn iges_body() -> String {
    let mut body = String::new();
    for (section, text) in [('S', "panel"), ('G', "1H,"), ('D', "110"), ('P', "110,0.0"), ('T', "S1G1D1P1")] {
        body.push_str(&format!("{text:<72}{section}{:>7}\n", 1));
    }
    body
}

#[tokio::test]
async fn test_import_creates_missing_document() {
    let hot = TestHotFolder::new().await;
    let ipt = hot.scratch("proj/part.ipt");
    let iges = hot.scratch("proj/part.igs");
    std::fs::write(&iges, iges_body()).unwrap();

    let agent = hot.start_agent().await;
    let job = Job::import_iges(ipt.to_string_lossy(), iges.to_string_lossy()).with_bring_to_front(true);
    hot.queue().enqueue(&job, "part").await.unwrap();

    let stats = agent.settle(|s| s.completed == 1).await;
    assert_eq!(stats.attempted, 1);
    agent.stop().await;

    assert!(ipt.is_file());
    let calls = hot.host.calls();
    match calls.as_slice() {
        [
            HostCall::FindOpen(found),
            HostCall::Create(TemplateKind::Part),
            HostCall::SaveAs(doc, saved),
            HostCall::ImportReference(imported_into, artifact, MeasurementUnit::Millimeter),
            HostCall::Save(resaved),
            HostCall::Activate(active),
        ] => {
            assert_eq!(found, &ipt);
            assert_eq!(saved, &ipt);
            assert_eq!(artifact, &iges);
            assert!([imported_into, resaved, active].iter().all(|d| *d == doc));
        }
        other => panic!("unexpected host calls: {other:?}"),
    }
    assert!(hot.host.active_document().is_some());
}

#[tokio::test]
async fn test_export_of_closed_document_is_skipped_and_acknowledged() {
    let hot = TestHotFolder::new().await;
    let agent = hot.start_agent().await;

    let out = hot.config.hot_folder.obj_dir();
    let job = Job::export_obj("C:/proj/part.ipt", out.to_string_lossy(), "P001", "A");
    hot.queue().enqueue(&job, "part_OBJ").await.unwrap();

    let stats = agent.settle(|s| s.skipped == 1).await;
    assert_eq!(stats.completed, 0);
    agent.stop().await;

    assert_eq!(
        hot.host.calls(),
        vec![HostCall::FindOpen(PathBuf::from("C:/proj/part.ipt"))]
    );
    assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);
}

#[tokio::test]
async fn test_each_job_file_is_attempted_once() {
    let hot = TestHotFolder::new().await;
    let queue = hot.queue();
    let out = hot.config.hot_folder.obj_dir();
    let enqueue = |n: usize| {
        let job = Job::export_obj(format!("C:/proj/p{n}.ipt"), out.to_string_lossy(), "P", "A");
        let queue = queue.clone();
        async move { queue.enqueue(&job, &format!("p{n}")).await.unwrap() }
    };

    for n in 0..3 {
        enqueue(n).await;
    }
    let agent = hot.start_agent().await;
    for n in 3..8 {
        enqueue(n).await;
    }

    agent.settle(|s| s.attempted == 8).await;
    let stats = agent.stop().await;

    assert_eq!(stats.attempted, 8);
    assert_eq!(stats.skipped, 8);
    let finds = hot
        .host
        .calls()
        .into_iter()
        .filter(|c| matches!(c, HostCall::FindOpen(_)))
        .count();
    assert_eq!(finds, 8);
    assert!(queue.pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_job_is_removed() {
    let hot = TestHotFolder::new().await;
    let agent = hot.start_agent().await;

    let bad = hot.config.hot_folder.jobs_dir().join("job_bad.json");
    std::fs::write(&bad, br#"{"Kind":"DeleteEverything","IptPath":"x"}"#).unwrap();

    let stats = agent.settle(|s| s.invalid == 1).await;
    assert_eq!(stats.attempted, 0);
    agent.stop().await;

    assert!(!bad.exists());
    assert!(hot.host.calls().is_empty());
}

#[tokio::test]
async fn test_claimed_jobs_leave_nothing_behind() {
    let hot = TestHotFolder::with_config(|c| c.watcher.claim_before_execute = true).await;
    let agent = hot.start_agent().await;

    let out = hot.config.hot_folder.obj_dir();
    let job = Job::export_obj("C:/proj/part.ipt", out.to_string_lossy(), "P001", "A");
    hot.queue().enqueue(&job, "claimed").await.unwrap();

    agent.settle(|s| s.skipped == 1).await;
    agent.stop().await;

    let stats = hot.queue().stats().await.unwrap();
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.claimed, 0);
}

#[tokio::test]
async fn test_obj_round_trip_reaches_the_inbox() {
    let hot = TestHotFolder::new().await;
    let layout = hot.config.hot_folder.clone();
    hot.host
        .open_in_session(layout.projects_dir().join("site.ipt"), true)
        .unwrap();

    let agent = hot.start_agent().await;
    let pipeline = ReferenceExportPipeline::new(&hot.config);
    pipeline
        .queue_obj_export(&PathBuf::from("/scans/site.3dr"), "P001", "A")
        .await
        .unwrap();

    agent.settle(|s| s.completed == 1).await;
    agent.stop().await;

    let obj = layout.obj_dir().join("site_P001_rA.obj");
    assert!(obj.is_file());
    let meta: PanelMeta = serde_json::from_slice(&std::fs::read(meta_for(&obj)).unwrap()).unwrap();
    assert_eq!(meta.panel_id, "P001");
    assert_eq!(meta.project_id, hot.config.project.project_id);

    let inbox = ObjInbox::with_policy(layout.clone(), StabilityPolicy::from_millis(100, 25, 3000));
    let script = inbox.handle_new_obj(&obj).await.unwrap().unwrap();
    assert_eq!(script, layout.latest_obj_script());
    let body = std::fs::read_to_string(script).unwrap();
    assert!(body.contains("site_P001_rA.obj"));
}
