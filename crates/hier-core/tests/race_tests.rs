//! Overlapping fetches: completion order is decided by the test through a
//! gated fetcher.

use hier_core::{FetchError, HierarchyError, Level, LevelPhase, Node, NodeId, Project};
use hier_test_utils::{
    assert_invariants, gated_controller, node, standard_dataset, GatedController, GatedFetcher,
};
use std::sync::Arc;

fn id(raw: i64) -> Option<NodeId> {
    Some(NodeId(raw))
}

/// Activate and release every step of the initial cascade
async fn settle_initial(ctl: &GatedController, gate: &Arc<GatedFetcher>) {
    let task = tokio::spawn({
        let ctl = ctl.clone();
        async move { ctl.activate().await }
    });

    for (level, parent) in [
        (Level::Project, None),
        (Level::Client, id(1)),
        (Level::Site, id(10)),
        (Level::Plant, id(100)),
    ] {
        gate.wait_for(level, parent).await;
        gate.release(level, parent);
    }

    assert!(task.await.unwrap());
    assert_eq!(ctl.current_path(), "P1 / C10 / S100 / PL1000");
}

#[tokio::test]
async fn late_response_for_an_older_selection_is_discarded() {
    let data = standard_dataset();
    let (ctl, gate) = gated_controller(data.clone());
    settle_initial(&ctl, &gate).await;

    let p2 = node(&data, Level::Project, 2);
    let p1 = node(&data, Level::Project, 1);

    let first = tokio::spawn({
        let ctl = ctl.clone();
        async move { ctl.select_project(Some(&p2)).await }
    });
    gate.wait_for(Level::Client, id(2)).await;

    let second = tokio::spawn({
        let ctl = ctl.clone();
        async move { ctl.select_project(Some(&p1)).await }
    });
    gate.wait_for(Level::Client, id(1)).await;

    // the newer request finishes first
    gate.release(Level::Client, id(1));
    gate.wait_for(Level::Site, id(10)).await;
    gate.release(Level::Site, id(10));
    gate.wait_for(Level::Plant, id(100)).await;
    gate.release(Level::Plant, id(100));
    second.await.unwrap().unwrap();

    // then the slow one arrives
    gate.release(Level::Client, id(2));
    first.await.unwrap().unwrap();

    let snap = ctl.snapshot();
    assert_eq!(snap.selected_project().unwrap().id, NodeId(1));
    let clients: Vec<NodeId> = snap.clients().iter().map(|c| c.id).collect();
    assert_eq!(clients, vec![NodeId(10), NodeId(11)]);
    assert_eq!(snap.selected_client().unwrap().id, NodeId(10));
    assert_eq!(snap.current_path(), "P1 / C10 / S100 / PL1000");

    assert_eq!(ctl.stats().stale_discarded, 1);
    assert!(!gate.calls().contains(&(Level::Site, id(20))));
    assert_eq!(gate.pending_count(), 0);
    assert_invariants(&ctl);
}

#[tokio::test]
async fn early_response_for_an_older_selection_is_discarded_too() {
    let data = standard_dataset();
    let (ctl, gate) = gated_controller(data.clone());
    settle_initial(&ctl, &gate).await;

    let p2 = node(&data, Level::Project, 2);
    let p3 = node(&data, Level::Project, 3);

    let first = tokio::spawn({
        let ctl = ctl.clone();
        async move { ctl.select_project(Some(&p2)).await }
    });
    gate.wait_for(Level::Client, id(2)).await;

    let second = tokio::spawn({
        let ctl = ctl.clone();
        async move { ctl.select_project(Some(&p3)).await }
    });
    gate.wait_for(Level::Client, id(3)).await;

    // older request resolves while the newer one is still pending
    gate.release(Level::Client, id(2));
    first.await.unwrap().unwrap();

    let mid = ctl.snapshot();
    assert!(mid.clients().is_empty());
    assert!(mid.selected_client().is_none());
    assert!(mid.is_loading());

    gate.release(Level::Client, id(3));
    second.await.unwrap().unwrap();

    let snap = ctl.snapshot();
    assert_eq!(snap.current_path(), "P3");
    assert!(snap.clients().is_empty());
    assert_eq!(snap.phase(Level::Client), LevelPhase::Loaded { selected: false });
    assert_eq!(gate.calls_for(Level::Site), 1);
    assert_invariants(&ctl);
}

#[tokio::test]
async fn parent_change_clears_children_before_fetching() {
    let data = standard_dataset();
    let (ctl, gate) = gated_controller(data.clone());
    settle_initial(&ctl, &gate).await;

    let p2 = node(&data, Level::Project, 2);
    let task = tokio::spawn({
        let ctl = ctl.clone();
        async move { ctl.select_project(Some(&p2)).await }
    });
    gate.wait_for(Level::Client, id(2)).await;

    let snap = ctl.snapshot();
    assert_eq!(snap.selected_project().unwrap().id, NodeId(2));
    for level in [Level::Client, Level::Site, Level::Plant] {
        assert!(snap.selected(level).is_none(), "{level} still selected");
        assert!(snap.items(level).is_empty(), "{level} still listed");
    }
    assert_eq!(snap.phase(Level::Client), LevelPhase::Loading);
    assert!(snap.is_loading());
    assert_eq!(snap.current_path(), "P2");
    assert_invariants(&ctl);

    gate.release(Level::Client, id(2));
    gate.wait_for(Level::Site, id(20)).await;
    gate.release(Level::Site, id(20));
    gate.wait_for(Level::Plant, id(200)).await;
    gate.release(Level::Plant, id(200));
    task.await.unwrap().unwrap();

    assert_eq!(ctl.current_path(), "P2 / C20 / S200 / PL2000");
    assert!(!ctl.is_loading());
}

#[tokio::test]
async fn failed_level_freezes_below_until_parent_is_reselected() {
    let data = standard_dataset();
    let (ctl, gate) = gated_controller(data.clone());
    settle_initial(&ctl, &gate).await;

    let c11 = node(&data, Level::Client, 11);
    let task = tokio::spawn({
        let ctl = ctl.clone();
        let c11 = c11.clone();
        async move { ctl.select_client(Some(&c11)).await }
    });
    gate.wait_for(Level::Site, id(11)).await;
    gate.fail(Level::Site, id(11), FetchError::ServerFault("503".to_string()));
    task.await.unwrap().unwrap();

    let snap = ctl.snapshot();
    assert_eq!(snap.selected_client().unwrap().id, NodeId(11));
    assert!(snap.sites().is_empty());
    assert!(snap.plants().is_empty());
    assert_eq!(snap.phase(Level::Site), LevelPhase::Failed);
    assert!(!snap.is_loading());
    assert!(matches!(
        snap.last_error(),
        Some(HierarchyError::FetchFailed {
            level: Level::Site,
            ..
        })
    ));
    assert_invariants(&ctl);

    // re-selecting the same client retries
    let retry = tokio::spawn({
        let ctl = ctl.clone();
        async move { ctl.select_client(Some(&c11)).await }
    });
    gate.wait_for(Level::Site, id(11)).await;
    gate.release(Level::Site, id(11));
    gate.wait_for(Level::Plant, id(110)).await;
    gate.release(Level::Plant, id(110));
    retry.await.unwrap().unwrap();

    let snap = ctl.snapshot();
    assert!(snap.last_error().is_none());
    assert_eq!(snap.current_path(), "P1 / C11 / S110");
    assert!(snap.selected_plant().is_none());
}

#[tokio::test]
async fn failed_refresh_keeps_the_last_loaded_hierarchy() {
    let data = standard_dataset();
    let (ctl, gate) = gated_controller(data);
    settle_initial(&ctl, &gate).await;

    let task = tokio::spawn({
        let ctl = ctl.clone();
        async move { ctl.refresh().await }
    });
    gate.wait_for(Level::Project, None).await;
    assert!(ctl.is_loading());
    gate.fail(Level::Project, None, FetchError::Unreachable("offline".to_string()));
    assert!(task.await.unwrap());

    let snap = ctl.snapshot();
    assert_eq!(snap.current_path(), "P1 / C10 / S100 / PL1000");
    assert_eq!(snap.projects().len(), 3);
    assert_eq!(snap.phase(Level::Project), LevelPhase::Failed);
    assert_eq!(snap.last_error().map(HierarchyError::level), Some(Level::Project));
    assert!(!snap.is_loading());
    assert_invariants(&ctl);
}

#[tokio::test]
async fn selection_made_during_refresh_survives_it() {
    let data = standard_dataset();
    let (ctl, gate) = gated_controller(data.clone());
    settle_initial(&ctl, &gate).await;

    let refresh = tokio::spawn({
        let ctl = ctl.clone();
        async move { ctl.refresh().await }
    });
    gate.wait_for(Level::Project, None).await;

    let c11 = node(&data, Level::Client, 11);
    let select = tokio::spawn({
        let ctl = ctl.clone();
        async move { ctl.select_client(Some(&c11)).await }
    });
    gate.wait_for(Level::Site, id(11)).await;
    gate.release(Level::Site, id(11));
    gate.wait_for(Level::Plant, id(110)).await;
    gate.release(Level::Plant, id(110));
    select.await.unwrap().unwrap();

    gate.release(Level::Project, None);
    gate.wait_for(Level::Client, id(1)).await;
    gate.release(Level::Client, id(1));
    gate.wait_for(Level::Site, id(11)).await;
    gate.release(Level::Site, id(11));
    gate.wait_for(Level::Plant, id(110)).await;
    gate.release(Level::Plant, id(110));
    assert!(refresh.await.unwrap());

    assert_eq!(ctl.current_path(), "P1 / C11 / S110");
    assert_invariants(&ctl);
}

#[tokio::test]
async fn project_picked_during_refresh_lands_in_the_new_list() {
    let data = standard_dataset();
    let (ctl, gate) = gated_controller(data.clone());
    settle_initial(&ctl, &gate).await;

    let mut grown = data.clone();
    grown.projects.push(Project::new(4, "P4", "New Project"));
    gate.replace_data(grown);

    let refresh = tokio::spawn({
        let ctl = ctl.clone();
        async move { ctl.refresh_data().await }
    });
    gate.wait_for(Level::Project, None).await;

    let p2 = node(&data, Level::Project, 2);
    let select = tokio::spawn({
        let ctl = ctl.clone();
        async move { ctl.select_project(Some(&p2)).await }
    });
    gate.wait_for(Level::Client, id(2)).await;
    assert!(ctl.snapshot().phase(Level::Project).is_loading());

    gate.release(Level::Project, None);
    // the refreshed list re-issues the client fetch for P2
    while gate.pending_count() < 2 {
        tokio::task::yield_now().await;
    }
    gate.release(Level::Client, id(2));
    select.await.unwrap().unwrap();
    gate.release(Level::Client, id(2));
    gate.wait_for(Level::Site, id(20)).await;
    gate.release(Level::Site, id(20));
    gate.wait_for(Level::Plant, id(200)).await;
    gate.release(Level::Plant, id(200));
    assert!(refresh.await.unwrap());

    let snap = ctl.snapshot();
    let projects: Vec<NodeId> = snap.items(Level::Project).iter().map(|n| n.id).collect();
    assert_eq!(projects, vec![NodeId(1), NodeId(2), NodeId(3), NodeId(4)]);
    assert_eq!(ctl.current_path(), "P2 / C20 / S200 / PL2000");
    assert_eq!(ctl.stats().stale_discarded, 1);
    assert_invariants(&ctl);
}

#[tokio::test]
async fn project_cleared_during_refresh_stays_cleared() {
    let data = standard_dataset();
    let (ctl, gate) = gated_controller(data.clone());
    settle_initial(&ctl, &gate).await;

    let mut grown = data.clone();
    grown.projects.push(Project::new(4, "P4", "New Project"));
    gate.replace_data(grown);

    let refresh = tokio::spawn({
        let ctl = ctl.clone();
        async move { ctl.refresh().await }
    });
    gate.wait_for(Level::Project, None).await;

    ctl.select_project(None).await.unwrap();
    gate.release(Level::Project, None);
    assert!(refresh.await.unwrap());

    let snap = ctl.snapshot();
    assert_eq!(snap.items(Level::Project).len(), 4);
    assert!(snap.selected(Level::Project).is_none());
    assert!(!snap.is_loading());
    assert_eq!(ctl.current_path(), "Select Project");
    assert_eq!(gate.calls_for(Level::Client), 1);
    assert_invariants(&ctl);
}

#[tokio::test]
async fn logout_makes_in_flight_fetches_stale() {
    let data = standard_dataset();
    let (ctl, gate) = gated_controller(data.clone());
    settle_initial(&ctl, &gate).await;

    let p2 = node(&data, Level::Project, 2);
    let task = tokio::spawn({
        let ctl = ctl.clone();
        async move { ctl.select_project(Some(&p2)).await }
    });
    gate.wait_for(Level::Client, id(2)).await;

    ctl.logout();
    gate.release(Level::Client, id(2));
    task.await.unwrap().unwrap();

    let snap = ctl.snapshot();
    for level in Level::ALL {
        assert!(snap.items(level).is_empty());
        assert!(snap.selected(level).is_none());
    }
    assert!(!snap.is_loading());
    assert_eq!(ctl.stats().stale_discarded, 1);
    assert_eq!(gate.calls_for(Level::Site), 1);
}

#[tokio::test]
async fn overlapping_refreshes_apply_only_the_latest() {
    let data = standard_dataset();
    let (ctl, gate) = gated_controller(data.clone());
    settle_initial(&ctl, &gate).await;

    let first = tokio::spawn({
        let ctl = ctl.clone();
        async move { ctl.refresh().await }
    });
    gate.wait_for(Level::Project, None).await;
    let second = tokio::spawn({
        let ctl = ctl.clone();
        async move { ctl.refresh().await }
    });
    while gate.pending_count() < 2 {
        tokio::task::yield_now().await;
    }

    // the older refresh answers with a list missing P1
    let mut shrunk = data.clone();
    shrunk.projects.retain(|p| p.id != NodeId(1));
    gate.respond(
        Level::Project,
        None,
        Ok(shrunk.projects.iter().cloned().map(Node::from).collect()),
    );
    assert!(first.await.unwrap());
    assert_eq!(ctl.current_path(), "P1 / C10 / S100 / PL1000");

    gate.release(Level::Project, None);
    for (level, parent) in [
        (Level::Client, id(1)),
        (Level::Site, id(10)),
        (Level::Plant, id(100)),
    ] {
        gate.wait_for(level, parent).await;
        gate.release(level, parent);
    }
    assert!(second.await.unwrap());

    assert_eq!(ctl.current_path(), "P1 / C10 / S100 / PL1000");
    assert_eq!(ctl.stats().stale_discarded, 1);
    assert_invariants(&ctl);
}
