use super::*;

#[test]
fn partition_state_default_is_empty() {
    assert!(PartitionState::default().clients.is_empty());
}

#[test]
fn zero_capacity_is_clamped() {
    let state = AppState::new(
        Arc::new(crate::services::directory::MemoryDirectory::new("Board")),
        0,
    );
    assert_eq!(state.channel_capacity, 1);
}

#[tokio::test]
async fn seed_member_creates_partition() {
    let state = test_helpers::test_app_state();
    let id = WhiteboardId::new("5");
    let (conn_id, _rx) = test_helpers::seed_member(&state, &id, 4).await;
    let partitions = state.partitions.read().await;
    assert!(partitions.get(&id).is_some_and(|p| p.clients.contains_key(&conn_id)));
}
