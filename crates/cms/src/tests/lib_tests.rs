use super::*;
use serde_json::json;
use shared::domain::{AUTHOR_TYPE, PLAYLIST_TYPE, STARTUP_TYPE};

async fn client() -> CmsClient {
    CmsClient::from_backend(SqliteCms::connect("sqlite::memory:").await.expect("db"))
}

async fn seed(cms: &CmsClient) -> StartupId {
    cms.create(
        NewDocument::new(AUTHOR_TYPE)
            .field("_id", "author-1")
            .field("id", "gh-1")
            .field("name", "Ada"),
    )
    .await
    .expect("author");
    let created = cms
        .create(
            NewDocument::new(STARTUP_TYPE)
                .field("title", "Rocket")
                .field("category", "Space")
                .field("slug", json!({ "_type": "slug", "current": "rocket" }))
                .field("author", json!({ "_type": "reference", "_ref": "author-1" })),
        )
        .await
        .expect("startup");
    StartupId::new(created["_id"].as_str().expect("id"))
}

#[test]
fn new_document_carries_type_tag() {
    let value = NewDocument::new("startup").field("title", "x").into_value();
    assert_eq!(value, json!({ "_type": "startup", "title": "x" }));
}

#[tokio::test]
async fn typed_reads_decode_domain_types() {
    let cms = client().await;
    let id = seed(&cms).await;

    let startup = cms.startup_by_id(&id).await.expect("read").expect("exists");
    assert_eq!(startup.title, "Rocket");
    assert_eq!(startup.author.expect("author").name.as_deref(), Some("Ada"));

    let views = cms.startup_views(&id).await.expect("views").expect("exists");
    assert_eq!(views.views, 0);

    assert!(cms
        .startup_by_id(&StartupId::new("missing"))
        .await
        .expect("read")
        .is_none());
    assert!(cms
        .playlist_by_slug("editor-picks-new")
        .await
        .expect("read")
        .is_none());
}

#[tokio::test]
async fn author_lookups_and_authored_startups() {
    let cms = client().await;
    let id = seed(&cms).await;

    let author = cms
        .author_by_external_id("gh-1")
        .await
        .expect("read")
        .expect("exists");
    assert_eq!(author.id, AuthorId::new("author-1"));

    let authored = cms.startups_by_author(&author.id).await.expect("read");
    assert_eq!(authored.len(), 1);
    assert_eq!(authored[0].id, id);

    let none = cms
        .startups_by_author(&AuthorId::new("nobody"))
        .await
        .expect("read");
    assert!(none.is_empty());
}

#[tokio::test]
async fn commit_applies_patch_through_writer() {
    let cms = client().await;
    let id = seed(&cms).await;

    cms.commit(Patch::new(id.as_str()).set("views", 3))
        .await
        .expect("patch");
    let views = cms.startup_views(&id).await.expect("views").expect("exists");
    assert_eq!(views.views, 3);

    let startups = cms.startups(None).await.expect("list");
    assert_eq!(startups[0].views, 3);
}

#[tokio::test]
async fn playlist_decodes_selected_startups() {
    let cms = client().await;
    let id = seed(&cms).await;
    cms.create(
        NewDocument::new(PLAYLIST_TYPE)
            .field("title", "Editor Picks")
            .field("slug", json!({ "_type": "slug", "current": "editor-picks-new" }))
            .field("select", json!([{ "_type": "reference", "_ref": id.as_str() }])),
    )
    .await
    .expect("playlist");

    let playlist = cms
        .playlist_by_slug("editor-picks-new")
        .await
        .expect("read")
        .expect("exists");
    assert_eq!(playlist.select.len(), 1);
    assert_eq!(playlist.select[0].id, id);
}
