use friendgraph::{
    BuildError, CacheStore, GraphBuilder, InMemorySource, MutualFriendSet, User,
};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn set(ids: &[&str]) -> MutualFriendSet {
    ids.iter().map(|s| s.to_string()).collect()
}

fn ann() -> User {
    User::new("1", "Ann")
}

#[tokio::test]
async fn test_sample_build_writes_cache_and_graph() {
    let temp_dir = TempDir::new().unwrap();
    let builder = GraphBuilder::new(InMemorySource::sample(), temp_dir.path());

    let report = builder.run().await.unwrap();

    assert_eq!(report.owner, ann());
    assert_eq!(report.total_friends, 2);
    assert_eq!(report.fetched, 2);
    assert_eq!(report.already_cached, 0);
    assert!(report.failed.is_empty());
    assert!(report.is_complete());
    assert_eq!(report.summary_line(), "Have mutual friends for 2 out of 2 friends");

    assert_eq!(report.cache_path, temp_dir.path().join("Ann").join("ann(1).mutualfriends.json"));
    assert_eq!(report.graph_path, temp_dir.path().join("Ann").join("Ann(1).graphml"));

    let cache = CacheStore::new(temp_dir.path().join("Ann"), ann()).load().unwrap();
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get("2"), Some(&set(&["3"])));
    assert_eq!(cache.get("3"), Some(&set(&[])));

    assert_eq!(report.graph.nodes, 3);
    assert_eq!(report.graph.edges, 3);
    let xml = fs::read_to_string(&report.graph_path).unwrap();
    assert!(xml.contains("edge1-&gt;2"));
    assert!(xml.contains("edge2-&gt;3"));
    assert!(xml.contains("edge1-&gt;3"));
}

#[tokio::test]
async fn test_second_run_fetches_nothing() {
    let temp_dir = TempDir::new().unwrap();

    let first = GraphBuilder::new(InMemorySource::sample(), temp_dir.path())
        .run()
        .await
        .unwrap();
    let cache_bytes = fs::read(&first.cache_path).unwrap();
    let graph_bytes = fs::read(&first.graph_path).unwrap();

    let source = Arc::new(InMemorySource::sample());
    let second = GraphBuilder::new(source.clone(), temp_dir.path())
        .run()
        .await
        .unwrap();

    assert!(source.mutual_calls().is_empty());
    assert_eq!(second.fetched, 0);
    assert_eq!(second.already_cached, 2);
    assert_eq!(fs::read(&second.cache_path).unwrap(), cache_bytes);
    assert_eq!(fs::read(&second.graph_path).unwrap(), graph_bytes);
}

#[tokio::test]
async fn test_failed_friend_is_fetched_next_run() {
    let temp_dir = TempDir::new().unwrap();

    let first = GraphBuilder::new(InMemorySource::sample().fail_once("2"), temp_dir.path())
        .run()
        .await
        .unwrap();
    assert_eq!(first.failed, vec!["2".to_string()]);
    assert_eq!(first.summary_line(), "Have mutual friends for 1 out of 2 friends");
    // Bob is a node, but without cached data he has no edges
    assert_eq!(first.graph.nodes, 3);
    assert_eq!(first.graph.edges, 1);

    let source = Arc::new(InMemorySource::sample());
    let second = GraphBuilder::new(source.clone(), temp_dir.path())
        .run()
        .await
        .unwrap();

    assert_eq!(source.mutual_calls(), vec!["2"]);
    assert!(second.is_complete());
    assert_eq!(second.graph.edges, 3);
}

#[tokio::test]
async fn test_former_friends_are_dropped() {
    let temp_dir = TempDir::new().unwrap();
    GraphBuilder::new(InMemorySource::sample(), temp_dir.path())
        .run()
        .await
        .unwrap();

    // Cy is no longer a friend; Dee is new
    let source = InMemorySource::new(ann())
        .with_friend(User::new("2", "Bob"), &["3"])
        .with_friend(User::new("4", "Dee"), &["2"]);
    let report = GraphBuilder::new(source, temp_dir.path()).run().await.unwrap();

    assert_eq!(report.stale_removed, 1);
    assert_eq!(report.fetched, 1);

    let cache = CacheStore::new(temp_dir.path().join("Ann"), ann()).load().unwrap();
    let keys: Vec<&String> = cache.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["2", "4"]);

    // Bob's cached edge to Cy has no node any more
    let xml = fs::read_to_string(&report.graph_path).unwrap();
    assert!(!xml.contains("friend3"));
    assert_eq!(report.graph.skipped_edges, 1);
}

#[tokio::test]
async fn test_corrupt_cache_is_set_aside() {
    let temp_dir = TempDir::new().unwrap();
    let directory = temp_dir.path().join("Ann");
    fs::create_dir_all(&directory).unwrap();
    let store = CacheStore::new(&directory, ann());
    fs::write(store.path(), b"{ not json").unwrap();

    let report = GraphBuilder::new(InMemorySource::sample(), temp_dir.path())
        .run()
        .await
        .unwrap();

    assert!(report.is_complete());
    let corrupt = directory.join("ann(1).mutualfriends.json.corrupt");
    assert_eq!(fs::read(corrupt).unwrap(), b"{ not json");
    assert_eq!(store.load().unwrap().len(), 2);
}

#[tokio::test]
async fn test_expired_token_keeps_progress() {
    let temp_dir = TempDir::new().unwrap();
    let source = InMemorySource::new(ann())
        .with_friend(User::new("2", "Bob"), &["3"])
        .with_friend(User::new("3", "Cy"), &[])
        .with_friend(User::new("4", "Dee"), &["2"])
        .expire_token_at("3");
    let source = Arc::new(source);

    let err = GraphBuilder::new(source.clone(), temp_dir.path())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, BuildError::Authentication(_)));
    // Nothing is requested after the credential is rejected
    assert_eq!(source.mutual_calls(), vec!["2", "3"]);

    let cache = CacheStore::new(temp_dir.path().join("Ann"), ann()).load().unwrap();
    assert_eq!(cache.len(), 1);
    assert!(cache.has("2"));
    assert!(temp_dir.path().join("Ann").join("Ann(1).graphml").exists());
}

#[tokio::test]
async fn test_no_friends() {
    let temp_dir = TempDir::new().unwrap();
    let report = GraphBuilder::new(InMemorySource::new(ann()), temp_dir.path())
        .run()
        .await
        .unwrap();

    assert_eq!(report.summary_line(), "Have mutual friends for 0 out of 0 friends");
    assert_eq!(report.graph.nodes, 1);
    assert_eq!(report.graph.edges, 0);
    assert!(report.cache_path.exists());
}

#[tokio::test]
async fn test_dot_owner_name_stays_in_data_dir() {
    let temp_dir = TempDir::new().unwrap();
    let data_dir = temp_dir.path().join("data");
    let source = InMemorySource::new(User::new("1", "..")).with_friend(User::new("2", "Bob"), &[]);

    let report = GraphBuilder::new(source, &data_dir).run().await.unwrap();

    assert_eq!(report.graph_path, data_dir.join("__").join("__(1).graphml"));
    assert!(report.cache_path.starts_with(data_dir.join("__")));
    assert!(report.graph_path.exists());
}
