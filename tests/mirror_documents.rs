mod common;

use common::{Fixture, entity, link};
use mdmirror::application::MirrorConfig;
use mdmirror::application::error::{MirrorError, Subject};
use mdmirror::config::IncludeSettings;
use mdmirror::domain::entities::{META_EXCERPT, META_INCLUDE, META_YOAST_DESCRIPTION};
use mdmirror::domain::types::{EligibleTypes, PublishStatus, Taxonomy};
use mdmirror::infra::content::SiteOptionUpdate;

#[tokio::test]
async fn hello_world_is_mirrored_and_indexed() {
    let fixture = Fixture::new();
    fixture.post("hello-world", "Hello World", "<p>Welcome to the site.</p>");

    let document = fixture
        .services
        .markdown
        .get_or_build_eligible("hello-world")
        .await
        .expect("entity document");
    assert_eq!(document, "# Hello World\n\nWelcome to the site.");

    let index = fixture.services.index.get_or_build().await.expect("index");
    assert!(index.starts_with("# Example Site\n\n> Test summary\n\n"));
    assert!(index.contains("## Available Content\n\n"));
    assert!(index.contains("### [Hello World](https://site/hello-world.md)\n\n"));
}

#[tokio::test]
async fn repeated_requests_are_served_from_cache() {
    let fixture = Fixture::new();
    let id = fixture.post("hello-world", "Hello World", "<p>Welcome.</p>");

    let first = fixture.services.index.get_or_build().await.expect("index");
    let second = fixture.services.index.get_or_build().await.expect("index");
    assert_eq!(first, second);
    assert_eq!(fixture.counting.list_calls(), 1);

    let first = fixture.services.markdown.get_or_build(id).await.expect("doc");
    let second = fixture.services.markdown.get_or_build(id).await.expect("doc");
    assert_eq!(first, second);
    assert_eq!(fixture.converter.calls(), 1);

    let first = fixture.services.context.get_or_build_basic().await.expect("basic");
    let second = fixture.services.context.get_or_build_basic().await.expect("basic");
    assert_eq!(first, second);
    assert_eq!(fixture.counting.list_calls(), 1);
}

#[tokio::test]
async fn opted_out_entities_are_absent_everywhere() {
    let fixture = Fixture::new();
    fixture.post("visible", "Visible", "<p>Shown.</p>");
    let mut hidden = entity("hidden", "Hidden Post", "<p>Secret.</p>", fixture.next_date());
    hidden.meta.insert(META_INCLUDE.into(), "no".into());
    fixture.insert(hidden);

    let err = fixture
        .services
        .markdown
        .get_or_build_eligible("hidden")
        .await
        .expect_err("excluded entity");
    assert!(matches!(
        err,
        MirrorError::ExcludedByPolicy {
            subject: Subject::Content,
            ..
        }
    ));

    let index = fixture.services.index.get_or_build().await.expect("index");
    let basic = fixture.services.context.get_or_build_basic().await.expect("basic");
    let full = fixture.services.context.get_or_build_full().await.expect("full");
    for document in [&index, &basic, &full] {
        assert!(document.contains("Visible"));
        assert!(!document.contains("Hidden Post"));
        assert!(!document.contains("Secret."));
    }
}

#[tokio::test]
async fn unknown_and_unpublished_slugs_are_not_served() {
    let fixture = Fixture::new();
    let mut draft = entity("draft", "Draft", "<p>Soon.</p>", fixture.next_date());
    draft.status = PublishStatus::Draft;
    fixture.insert(draft);

    let missing = fixture
        .services
        .markdown
        .get_or_build_eligible("missing")
        .await
        .expect_err("missing slug");
    assert!(matches!(missing, MirrorError::NotFound { .. }));

    let draft = fixture
        .services
        .markdown
        .get_or_build_eligible("draft")
        .await
        .expect_err("draft slug");
    assert!(matches!(draft, MirrorError::ExcludedByPolicy { .. }));
}

#[tokio::test]
async fn ineligible_content_types_are_excluded() {
    let fixture = Fixture::new();
    let mut product = entity("widget", "Widget", "<p>Buy.</p>", fixture.next_date());
    product.content_type = "product".into();
    fixture.insert(product);

    let err = fixture
        .services
        .markdown
        .get_or_build_eligible("widget")
        .await
        .expect_err("ineligible type");
    assert!(err.is_not_found());

    let index = fixture.services.index.get_or_build().await.expect("index");
    assert!(!index.contains("Widget"));
}

#[tokio::test]
async fn index_lists_newest_first_with_meta_and_excerpt() {
    let fixture = Fixture::new();
    let mut older = entity("older", "Older", "<p>Old.</p>", fixture.next_date());
    older.excerpt = "Stored excerpt".into();
    older.meta.insert(META_YOAST_DESCRIPTION.into(), "SEO line".into());
    fixture.insert(older);
    let mut newer = entity("newer", "Newer", "<p>New.</p>", fixture.next_date());
    newer.meta.insert(META_EXCERPT.into(), "Same text".into());
    newer.meta.insert(META_YOAST_DESCRIPTION.into(), "Same text".into());
    fixture.insert(newer);

    let index = fixture.services.index.get_or_build().await.expect("index");
    let newer_at = index.find("### [Newer]").expect("newer entry");
    let older_at = index.find("### [Older]").expect("older entry");
    assert!(newer_at < older_at);

    assert!(index.contains(
        "### [Older](https://site/older.md)\n\n_Meta: SEO line_\n\nStored excerpt\n\n---\n\n"
    ));
    // An excerpt equal to the summary is written once.
    assert!(index.contains("### [Newer](https://site/newer.md)\n\n_Meta: Same text_\n\n---\n\n"));
    assert!(!index.contains("Old."));
}

#[tokio::test]
async fn index_can_embed_entity_documents() {
    let mut config = MirrorConfig::new(common::SITE_URL);
    config.include = IncludeSettings {
        content: true,
        ..IncludeSettings::default()
    };
    let fixture = Fixture::with_mirror(config);
    let id = fixture.post("hello-world", "Hello World", "<p>Welcome.</p>");

    let index = fixture.services.index.get_or_build().await.expect("index");
    assert!(index.contains("# Hello World\n\nWelcome.\n\n"));
    assert_eq!(fixture.converter.calls(), 1);

    // The embedded document is shared with the entity cache.
    fixture.services.markdown.get_or_build(id).await.expect("doc");
    assert_eq!(fixture.converter.calls(), 1);
}

#[tokio::test]
async fn index_groups_entries_by_taxonomy() {
    let fixture = Fixture::new();
    let news = fixture.term(Taxonomy::Category, "news", "News");
    let rust = fixture.term(Taxonomy::Tag, "rust", "Rust");
    fixture.term(Taxonomy::Tag, "empty", "Empty");
    let mut post = entity("hello-world", "Hello World", "<p>Hi.</p>", fixture.next_date());
    post.terms = vec![news, rust];
    fixture.insert(post);

    let index = fixture.services.index.get_or_build().await.expect("index");
    assert!(index.contains(
        "## Categories\n\n### News\n\n- [Hello World](https://site/hello-world.md)\n\n---\n\n"
    ));
    assert!(index.contains("## Tags\n\n### Rust\n\n"));
    assert!(!index.contains("### Empty"));
    assert!(index.contains("**Categories:** News\n\n**Tags:** Rust\n\n---\n\n"));
}

#[tokio::test]
async fn taxonomy_sections_can_be_disabled() {
    let mut config = MirrorConfig::new(common::SITE_URL);
    config.include_taxonomies = false;
    let fixture = Fixture::with_mirror(config);
    let news = fixture.term(Taxonomy::Category, "news", "News");
    let mut post = entity("hello-world", "Hello World", "<p>Hi.</p>", fixture.next_date());
    post.terms = vec![news];
    fixture.insert(post);

    let index = fixture.services.index.get_or_build().await.expect("index");
    assert!(!index.contains("## Categories"));
    assert!(!index.contains("**Categories:**"));
}

#[tokio::test]
async fn basic_context_strips_links_from_the_index() {
    let fixture = Fixture::new();
    fixture.post("hello-world", "Hello World", "<p>Welcome.</p>");

    let basic = fixture.services.context.get_or_build_basic().await.expect("basic");
    assert!(basic.starts_with("# Example Site\n\n> Test summary"));
    assert!(basic.contains("### Hello World"));
    assert!(!basic.contains("https://"));
    assert!(!basic.contains("]("));
}

#[tokio::test]
async fn taxonomy_archive_lists_term_members() {
    let fixture = Fixture::new();
    fixture.store.update_site_option(SiteOptionUpdate::EligibleTypes(EligibleTypes::new([
        "post",
        "page",
        "tax_category",
    ])));
    let news = fixture.term(Taxonomy::Category, "news", "News");
    let mut member = entity("hello-world", "Hello World", "<p>Hi.</p>", fixture.next_date());
    member.terms = vec![news];
    member.excerpt = "A greeting".into();
    fixture.insert(member);
    fixture.post("elsewhere", "Elsewhere", "<p>Other.</p>");

    let archive = fixture
        .services
        .taxonomy
        .get_or_build(Taxonomy::Category, "news")
        .await
        .expect("archive");
    assert_eq!(
        archive,
        "# News\n\n## [Hello World](https://site/hello-world.md)\n\nA greeting\n\n---\n\n"
    );

    let missing = fixture
        .services
        .taxonomy
        .get_or_build(Taxonomy::Category, "missing")
        .await
        .expect_err("unknown term");
    assert!(matches!(
        missing,
        MirrorError::NotFound {
            subject: Subject::TaxonomyTerm,
            ..
        }
    ));
}

#[tokio::test]
async fn taxonomy_archives_require_an_archive_type() {
    let fixture = Fixture::new();
    fixture.term(Taxonomy::Tag, "rust", "Rust");

    let err = fixture
        .services
        .taxonomy
        .get_or_build(Taxonomy::Tag, "rust")
        .await
        .expect_err("archive disabled");
    assert!(matches!(
        err,
        MirrorError::ExcludedByPolicy {
            subject: Subject::TaxonomyArchive,
            ..
        }
    ));
}

#[tokio::test]
async fn conversion_failures_surface_as_errors() {
    let fixture = Fixture::new();
    fixture.post("broken", "Broken", "<p>FAIL</p>");
    fixture.post("fine", "Fine", &link("broken", "Broken"));

    let err = fixture
        .services
        .markdown
        .get_or_build_eligible("broken")
        .await
        .expect_err("conversion failure");
    assert!(matches!(err, MirrorError::Conversion(_)));
    assert!(!err.is_not_found());
}
