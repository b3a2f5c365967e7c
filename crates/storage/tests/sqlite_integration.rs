use roadmap_core::model::{Item, ItemId, ProgressMap, Roadmap, Status};
use storage::repository::{JsonStore, KeyValueStore};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

#[tokio::test]
async fn sqlite_roundtrips_raw_values() {
    let repo = connect("memdb_raw").await;

    assert!(repo.get("missing").await.unwrap().is_none());

    repo.set("k", "\"v1\"".into()).await.unwrap();
    repo.set("k", "\"v2\"".into()).await.unwrap();
    assert_eq!(repo.get("k").await.unwrap().as_deref(), Some("\"v2\""));

    repo.remove("k").await.unwrap();
    assert!(repo.get("k").await.unwrap().is_none());
    // removing twice is fine
    repo.remove("k").await.unwrap();
}

#[tokio::test]
async fn sqlite_persists_roadmap_and_progress_together() {
    let repo = connect("memdb_pair").await;
    let store = JsonStore::new(std::sync::Arc::new(repo.clone()));

    let roadmap = Roadmap::new(
        "Rust",
        vec![
            Item::new("a", "Ownership"),
            Item::new("b", "Traits").with_resource("Book", "https://doc.rust-lang.org/book/"),
        ],
    );
    let mut progress = ProgressMap::new();
    progress.entry_mut(&ItemId::new("b")).status = Status::InProgress;

    store
        .write_pair(("default/roadmap", &roadmap), ("default/userProgress", &progress))
        .await
        .unwrap();

    let fetched: Roadmap = store.read("default/roadmap").await.unwrap().unwrap();
    assert_eq!(fetched, roadmap);
    let fetched: ProgressMap = store.read("default/userProgress").await.unwrap().unwrap();
    assert_eq!(fetched.get("b").unwrap().status, Status::InProgress);
}

#[tokio::test]
async fn sqlite_corrupt_value_reads_as_absent() {
    let repo = connect("memdb_corrupt").await;
    repo.set("default/roadmap", "{\"title\": ".into())
        .await
        .unwrap();

    let store = JsonStore::new(std::sync::Arc::new(repo));
    let fetched: Option<Roadmap> = store.read("default/roadmap").await.unwrap();
    assert!(fetched.is_none());
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = connect("memdb_migrate").await;
    repo.migrate().await.expect("second migrate");
    repo.set("k", "1".into()).await.unwrap();
    assert_eq!(repo.get("k").await.unwrap().as_deref(), Some("1"));
}
