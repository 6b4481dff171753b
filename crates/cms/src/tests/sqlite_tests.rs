use super::*;
use serde_json::json;

async fn store() -> SqliteCms {
    SqliteCms::connect("sqlite::memory:").await.expect("db")
}

async fn seed_author(store: &SqliteCms, id: &str, name: &str) {
    store
        .create(
            NewDocument::new(AUTHOR_TYPE)
                .field("_id", id)
                .field("id", format!("gh-{id}"))
                .field("name", name)
                .field("username", name.to_lowercase()),
        )
        .await
        .expect("author");
}

async fn seed_startup(store: &SqliteCms, title: &str, category: &str, author: &str) -> String {
    let created = store
        .create(
            NewDocument::new(STARTUP_TYPE)
                .field("title", title)
                .field("description", "A description long enough")
                .field("category", category)
                .field("image", "https://example.com/a.png")
                .field("slug", json!({ "_type": "slug", "current": title.to_lowercase() }))
                .field("author", json!({ "_type": "reference", "_ref": author }))
                .field("pitch", "# Pitch"),
        )
        .await
        .expect("startup");
    created["_id"].as_str().expect("id").to_string()
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    store().await.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("content.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let store = SqliteCms::connect(&database_url).await.expect("db");
    drop(store);

    assert!(db_path.exists(), "database file should exist: {}", db_path.display());
}

#[tokio::test]
async fn create_assigns_id_and_system_fields() {
    let store = store().await;
    seed_author(&store, "a1", "Ada").await;
    let created = store
        .create(
            NewDocument::new(STARTUP_TYPE)
                .field("title", "Rocket")
                .field("slug", json!({ "_type": "slug", "current": "rocket" }))
                .field("author", json!({ "_type": "reference", "_ref": "a1" })),
        )
        .await
        .expect("create");

    assert_eq!(created["_type"], "startup");
    assert!(!created["_id"].as_str().expect("id").is_empty());
    assert!(created["_createdAt"].is_string());
    assert_eq!(created["title"], "Rocket");
}

#[tokio::test]
async fn create_rejects_unknown_type_and_missing_author() {
    let store = store().await;
    let err = store
        .create(NewDocument::new("widget").field("title", "x"))
        .await
        .expect_err("unknown type");
    assert!(matches!(err, CmsError::Rejected(_)));

    let err = store
        .create(
            NewDocument::new(STARTUP_TYPE)
                .field("title", "Orphan")
                .field("author", json!({ "_type": "reference", "_ref": "nobody" })),
        )
        .await
        .expect_err("dangling author reference");
    assert!(matches!(err, CmsError::Database(_)));
}

#[tokio::test]
async fn startup_by_id_projects_author_and_pitch() {
    let store = store().await;
    seed_author(&store, "a1", "Ada").await;
    let id = seed_startup(&store, "Rocket", "Space", "a1").await;

    let value = store
        .fetch(&Query::StartupById { id: id.as_str().into() }, FetchMode::Cached)
        .await
        .expect("fetch");
    assert_eq!(value["_id"], id.as_str());
    assert_eq!(value["author"]["name"], "Ada");
    assert_eq!(value["pitch"], "# Pitch");
    assert_eq!(value["slug"]["current"], "rocket");
    assert_eq!(value["views"], 0);

    let missing = store
        .fetch(&Query::StartupById { id: "missing".into() }, FetchMode::Cached)
        .await
        .expect("fetch");
    assert!(missing.is_null());
}

#[tokio::test]
async fn search_matches_title_category_and_author_name_by_word_prefix() {
    let store = store().await;
    seed_author(&store, "a1", "Ada Lovelace").await;
    seed_author(&store, "a2", "Grace").await;
    seed_startup(&store, "Digital Health Records", "Software", "a2").await;
    seed_startup(&store, "Clinic Finder", "Health", "a2").await;
    seed_startup(&store, "Engine", "Hardware", "a1").await;
    seed_startup(&store, "Stealthy", "Security", "a2").await;

    let all = store
        .fetch(&Query::Startups { search: None }, FetchMode::Cached)
        .await
        .expect("all");
    assert_eq!(all.as_array().expect("array").len(), 4);
    assert!(all[0].get("pitch").is_none(), "list projection omits pitch");

    let health = store
        .fetch(
            &Query::Startups {
                search: Some("health".into()),
            },
            FetchMode::Cached,
        )
        .await
        .expect("health");
    let titles: Vec<&str> = health
        .as_array()
        .expect("array")
        .iter()
        .map(|s| s["title"].as_str().expect("title"))
        .collect();
    assert_eq!(titles, vec!["Clinic Finder", "Digital Health Records"]);

    let by_author = store
        .fetch(
            &Query::Startups {
                search: Some("love".into()),
            },
            FetchMode::Cached,
        )
        .await
        .expect("author search");
    assert_eq!(by_author.as_array().expect("array").len(), 1);
    assert_eq!(by_author[0]["title"], "Engine");
}

#[tokio::test]
async fn search_escapes_like_wildcards() {
    let store = store().await;
    seed_author(&store, "a1", "Ada").await;
    seed_startup(&store, "Rocket", "Space", "a1").await;

    let wildcard = store
        .fetch(
            &Query::Startups {
                search: Some("%".into()),
            },
            FetchMode::Cached,
        )
        .await
        .expect("search");
    assert!(wildcard.as_array().expect("array").is_empty());
}

#[tokio::test]
async fn views_patch_updates_count_and_rejects_unknown_fields() {
    let store = store().await;
    seed_author(&store, "a1", "Ada").await;
    let id = seed_startup(&store, "Rocket", "Space", "a1").await;

    let patched = Patch::new(&id)
        .set("views", 5)
        .commit(&store)
        .await
        .expect("patch");
    assert_eq!(patched["views"], 5);

    let views = store
        .fetch(&Query::StartupViews { id: id.as_str().into() }, FetchMode::Fresh)
        .await
        .expect("views");
    assert_eq!(views, json!({ "_id": id.clone(), "views": 5 }));

    let err = Patch::new(&id)
        .set("slug", "other")
        .commit(&store)
        .await
        .expect_err("slug is immutable");
    assert!(matches!(err, CmsError::Rejected(_)));

    let err = Patch::new("missing")
        .set("views", 1)
        .commit(&store)
        .await
        .expect_err("missing document");
    assert!(matches!(err, CmsError::MissingDocument(_)));
}

#[tokio::test]
async fn playlist_resolves_references_in_order_and_skips_dangling() {
    let store = store().await;
    seed_author(&store, "a1", "Ada").await;
    let first = seed_startup(&store, "First", "One", "a1").await;
    let second = seed_startup(&store, "Second", "Two", "a1").await;
    store
        .create(
            NewDocument::new(PLAYLIST_TYPE)
                .field("title", "Editor Picks")
                .field("slug", json!({ "_type": "slug", "current": "editor-picks-new" }))
                .field(
                    "select",
                    json!([
                        { "_type": "reference", "_ref": second },
                        { "_type": "reference", "_ref": "deleted" },
                        { "_type": "reference", "_ref": first },
                    ]),
                ),
        )
        .await
        .expect("playlist");

    let value = store
        .fetch(
            &Query::PlaylistBySlug {
                slug: "editor-picks-new".into(),
            },
            FetchMode::Cached,
        )
        .await
        .expect("playlist");
    let select = value["select"].as_array().expect("select");
    assert_eq!(select.len(), 3);
    assert_eq!(select[0]["title"], "Second");
    assert!(select[1].is_null());
    assert_eq!(select[2]["title"], "First");

    let playlist: shared::domain::Playlist = serde_json::from_value(value).expect("decode");
    assert_eq!(playlist.select.len(), 2);
}

#[tokio::test]
async fn authors_resolve_by_document_and_external_id() {
    let store = store().await;
    seed_author(&store, "a1", "Ada").await;

    let by_id = store
        .fetch(&Query::AuthorById { id: "a1".into() }, FetchMode::Cached)
        .await
        .expect("by id");
    assert_eq!(by_id["username"], "ada");

    let by_external = store
        .fetch(
            &Query::AuthorByExternalId { id: "gh-a1".into() },
            FetchMode::Cached,
        )
        .await
        .expect("by external id");
    assert_eq!(by_external["_id"], "a1");
}

#[test]
fn word_prefix_pattern_escapes_wildcards() {
    assert_eq!(word_prefix_pattern("Health"), "% health%");
    assert_eq!(word_prefix_pattern("50%_off"), r"% 50\%\_off%");
    assert_eq!(word_prefix_pattern("ÉCHELLE"), "% Échelle%");
}

#[tokio::test]
async fn search_folds_ascii_case_and_keeps_accented_letters_as_written() {
    let store = store().await;
    seed_author(&store, "a1", "Ada").await;
    seed_startup(&store, "Échelle Robotics", "Hardware", "a1").await;

    let count = |search: &'static str| {
        let store = store.clone();
        async move {
            store
                .fetch(
                    &Query::Startups {
                        search: Some(search.into()),
                    },
                    FetchMode::Cached,
                )
                .await
                .expect("search")
                .as_array()
                .expect("array")
                .len()
        }
    };

    assert_eq!(count("Échelle").await, 1);
    assert_eq!(count("ÉCHELLE").await, 1);
    assert_eq!(count("ROBO").await, 1);
}
