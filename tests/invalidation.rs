mod common;

use std::time::Duration;

use common::{Fixture, SITE_URL, entity};
use mdmirror::application::MirrorConfig;
use mdmirror::cache::{CacheConfig, CacheKey};
use mdmirror::domain::entities::{META_INCLUDE, META_YOAST_DESCRIPTION};
use mdmirror::domain::types::{EligibleTypes, PublishStatus, Taxonomy};
use mdmirror::infra::content::SiteOptionUpdate;
use uuid::Uuid;

fn cached(fixture: &Fixture, key: CacheKey) -> bool {
    let cache = &fixture.services.cache;
    let group = if key.is_taxonomy() {
        cache.taxonomy_group()
    } else {
        cache.group()
    };
    fixture.cache_store.contains(group, &key.render())
}

async fn warm(fixture: &Fixture, ids: &[Uuid]) {
    for id in ids {
        fixture.services.markdown.get_or_build(*id).await.expect("entity");
    }
    fixture.services.index.get_or_build().await.expect("index");
    fixture.services.context.get_or_build_basic().await.expect("basic");
    fixture.services.context.get_or_build_full().await.expect("full");
}

fn aggregates_cached(fixture: &Fixture) -> [bool; 3] {
    [
        cached(fixture, CacheKey::IndexDocument),
        cached(fixture, CacheKey::BasicContext),
        cached(fixture, CacheKey::FullContext),
    ]
}

#[tokio::test]
async fn watched_meta_clears_entity_and_aggregates_only() {
    let fixture = Fixture::new();
    let edited = fixture.post("edited", "Edited", "<p>One.</p>");
    let untouched = fixture.post("untouched", "Untouched", "<p>Two.</p>");
    warm(&fixture, &[edited, untouched]).await;
    assert_eq!(aggregates_cached(&fixture), [true, true, true]);

    fixture
        .store
        .set_meta(edited, META_YOAST_DESCRIPTION, "Fresh summary")
        .expect("set meta");

    assert!(!cached(&fixture, CacheKey::EntityMarkdown(edited)));
    assert!(cached(&fixture, CacheKey::EntityMarkdown(untouched)));
    assert_eq!(aggregates_cached(&fixture), [false, false, false]);

    let index = fixture.services.index.get_or_build().await.expect("index");
    assert!(index.contains("_Meta: Fresh summary_"));
}

#[tokio::test]
async fn unwatched_meta_keeps_the_cache() {
    let fixture = Fixture::new();
    let id = fixture.post("hello", "Hello", "<p>Hi.</p>");
    warm(&fixture, &[id]).await;

    fixture.store.set_meta(id, "colour", "blue").expect("set meta");

    assert!(cached(&fixture, CacheKey::EntityMarkdown(id)));
    assert_eq!(aggregates_cached(&fixture), [true, true, true]);
}

#[tokio::test]
async fn opting_out_removes_the_entity_from_the_index() {
    let fixture = Fixture::new();
    let id = fixture.post("hello", "Hello", "<p>Hi.</p>");
    let index = fixture.services.index.get_or_build().await.expect("index");
    assert!(index.contains("### [Hello]"));

    fixture.store.set_meta(id, META_INCLUDE, "no").expect("opt out");

    let index = fixture.services.index.get_or_build().await.expect("index");
    assert!(!index.contains("### [Hello]"));
    assert!(
        fixture
            .services
            .markdown
            .get_or_build_eligible("hello")
            .await
            .is_err()
    );
}

#[tokio::test]
async fn autosave_never_invalidates() {
    let fixture = Fixture::new();
    let id = fixture.post("hello", "Hello", "<p>Original.</p>");
    warm(&fixture, &[id]).await;

    let mut revision = entity("hello", "Hello", "<p>Work in progress.</p>", fixture.next_date());
    revision.id = id;
    fixture.store.autosave(revision).expect("autosave");

    assert!(cached(&fixture, CacheKey::EntityMarkdown(id)));
    assert_eq!(aggregates_cached(&fixture), [true, true, true]);
    assert!(fixture.store.autosaved_revision(id).is_some());

    let document = fixture.services.markdown.get_or_build(id).await.expect("doc");
    assert_eq!(document, "# Hello\n\nOriginal.");
}

#[tokio::test]
async fn updates_rebuild_the_entity_document() {
    let fixture = Fixture::new();
    let id = fixture.post("hello", "Hello", "<p>Original.</p>");
    warm(&fixture, &[id]).await;

    let mut updated = entity("hello", "Hello Again", "<p>Revised.</p>", fixture.next_date());
    updated.id = id;
    fixture.store.update(updated).expect("update");

    assert_eq!(aggregates_cached(&fixture), [false, false, false]);
    let document = fixture.services.markdown.get_or_build(id).await.expect("doc");
    assert_eq!(document, "# Hello Again\n\nRevised.");
}

#[tokio::test]
async fn slug_changes_rebuild_the_index() {
    let fixture = Fixture::new();
    let id = fixture.post("old-slug", "Moving", "<p>Hi.</p>");
    fixture.services.index.get_or_build().await.expect("index");

    let mut moved = entity("new-slug", "Moving", "<p>Hi.</p>", fixture.next_date());
    moved.id = id;
    fixture.store.update(moved).expect("update");

    let index = fixture.services.index.get_or_build().await.expect("index");
    assert!(index.contains("https://site/new-slug.md"));
    assert!(!index.contains("old-slug"));
}

#[tokio::test]
async fn status_transitions_follow_publication() {
    let fixture = Fixture::new();
    let visible = fixture.post("visible", "Visible", "<p>Hi.</p>");
    let mut draft = entity("later", "Later", "<p>Soon.</p>", fixture.next_date());
    draft.status = PublishStatus::Draft;
    let draft = fixture.insert(draft);
    warm(&fixture, &[visible]).await;

    // Neither side published: nothing to clear.
    fixture
        .store
        .set_status(draft, PublishStatus::Trashed)
        .expect("trash draft");
    assert_eq!(aggregates_cached(&fixture), [true, true, true]);

    fixture
        .store
        .set_status(draft, PublishStatus::Published)
        .expect("publish");
    assert_eq!(aggregates_cached(&fixture), [false, false, false]);
    let index = fixture.services.index.get_or_build().await.expect("index");
    assert!(index.contains("### [Later]"));

    fixture.store.trash(visible).expect("trash");
    assert!(!cached(&fixture, CacheKey::EntityMarkdown(visible)));
    let index = fixture.services.index.get_or_build().await.expect("index");
    assert!(!index.contains("### [Visible]"));
}

#[tokio::test]
async fn deleting_an_entity_clears_its_document() {
    let fixture = Fixture::new();
    let id = fixture.post("gone", "Gone", "<p>Bye.</p>");
    warm(&fixture, &[id]).await;

    fixture.store.delete(id).expect("delete");

    assert!(!cached(&fixture, CacheKey::EntityMarkdown(id)));
    assert_eq!(aggregates_cached(&fixture), [false, false, false]);
    assert!(
        fixture
            .services
            .markdown
            .get_or_build_eligible("gone")
            .await
            .is_err()
    );
}

#[tokio::test]
async fn summary_options_clear_aggregates_but_keep_entities() {
    let fixture = Fixture::new();
    let id = fixture.post("hello", "Hello", "<p>Hi.</p>");
    warm(&fixture, &[id]).await;

    fixture
        .store
        .update_site_option(SiteOptionUpdate::CustomSummary(Some("New summary".into())));

    assert!(cached(&fixture, CacheKey::EntityMarkdown(id)));
    assert_eq!(aggregates_cached(&fixture), [false, false, false]);
    let index = fixture.services.index.get_or_build().await.expect("index");
    assert!(index.starts_with("# Example Site\n\n> New summary\n\n"));
}

#[tokio::test]
async fn eligible_type_changes_flush_everything() {
    let fixture = Fixture::new();
    fixture.store.update_site_option(SiteOptionUpdate::EligibleTypes(EligibleTypes::new([
        "post",
        "tax_tag",
    ])));
    let tag = fixture.term(Taxonomy::Tag, "rust", "Rust");
    let mut post = entity("hello", "Hello", "<p>Hi.</p>", fixture.next_date());
    post.terms = vec![tag];
    let id = fixture.insert(post);
    warm(&fixture, &[id]).await;
    fixture
        .services
        .taxonomy
        .get_or_build(Taxonomy::Tag, "rust")
        .await
        .expect("archive");
    let archive_key = CacheKey::TaxonomyArchive {
        taxonomy: Taxonomy::Tag,
        term_id: tag,
    };
    assert!(cached(&fixture, archive_key));

    fixture
        .store
        .update_site_option(SiteOptionUpdate::EligibleTypes(EligibleTypes::new(["page"])));

    assert!(fixture.cache_store.is_empty());
    let index = fixture.services.index.get_or_build().await.expect("index");
    assert!(!index.contains("### [Hello]"));
}

#[tokio::test]
async fn entity_changes_clear_taxonomy_archives() {
    let fixture = Fixture::new();
    fixture.store.update_site_option(SiteOptionUpdate::EligibleTypes(EligibleTypes::new([
        "post",
        "tax_category",
    ])));
    let news = fixture.term(Taxonomy::Category, "news", "News");
    fixture
        .services
        .taxonomy
        .get_or_build(Taxonomy::Category, "news")
        .await
        .expect("archive");

    let mut post = entity("hello", "Hello", "<p>Hi.</p>", fixture.next_date());
    post.terms = vec![news];
    fixture.insert(post);

    assert!(!cached(
        &fixture,
        CacheKey::TaxonomyArchive {
            taxonomy: Taxonomy::Category,
            term_id: news,
        }
    ));
    let archive = fixture
        .services
        .taxonomy
        .get_or_build(Taxonomy::Category, "news")
        .await
        .expect("archive");
    assert!(archive.contains("## [Hello](https://site/hello.md)"));
}

#[tokio::test]
async fn flush_all_forces_exactly_one_rebuild() {
    let fixture = Fixture::new();
    fixture.post("hello", "Hello", "<p>Hi.</p>");
    fixture.services.index.get_or_build().await.expect("index");
    assert_eq!(fixture.counting.list_calls(), 1);

    fixture.services.cache.flush_all();

    fixture.services.index.get_or_build().await.expect("index");
    fixture.services.index.get_or_build().await.expect("index");
    assert_eq!(fixture.counting.list_calls(), 2);
}

#[tokio::test]
async fn expired_entries_are_rebuilt() {
    let cache = CacheConfig {
        ttl_seconds: 60,
        ..CacheConfig::default()
    };
    let fixture = Fixture::with_config(MirrorConfig::new(SITE_URL), cache);
    fixture.post("hello", "Hello", "<p>Hi.</p>");

    let ttl = fixture.services.cache.ttl();
    assert_eq!(ttl, Duration::from_secs(60));

    fixture.services.index.get_or_build().await.expect("index");
    fixture.clock.advance(ttl - Duration::from_secs(1));
    fixture.services.index.get_or_build().await.expect("index");
    assert_eq!(fixture.counting.list_calls(), 1);

    fixture.clock.advance(Duration::from_secs(1));
    fixture.services.index.get_or_build().await.expect("index");
    assert_eq!(fixture.counting.list_calls(), 2);
}

#[tokio::test]
async fn disabled_cache_rebuilds_every_request() {
    let cache = CacheConfig {
        enabled: false,
        ..CacheConfig::default()
    };
    let fixture = Fixture::with_config(MirrorConfig::new(SITE_URL), cache);
    let id = fixture.post("hello", "Hello", "<p>Hi.</p>");

    fixture.services.index.get_or_build().await.expect("index");
    fixture.services.index.get_or_build().await.expect("index");
    fixture.services.markdown.get_or_build(id).await.expect("doc");
    fixture.services.markdown.get_or_build(id).await.expect("doc");

    assert_eq!(fixture.counting.list_calls(), 2);
    assert_eq!(fixture.converter.calls(), 2);
    assert!(fixture.cache_store.is_empty());
}

#[tokio::test]
async fn oversized_documents_are_served_uncached() {
    let cache = CacheConfig {
        max_entry_bytes: 16,
        ..CacheConfig::default()
    };
    let fixture = Fixture::with_config(MirrorConfig::new(SITE_URL), cache);
    let id = fixture.post("long", "Long", "<p>This body is longer than sixteen bytes.</p>");

    let document = fixture.services.markdown.get_or_build(id).await.expect("doc");
    assert!(document.contains("longer than sixteen bytes"));
    assert!(!cached(&fixture, CacheKey::EntityMarkdown(id)));
}
