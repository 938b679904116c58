//! Snapshot pipeline tests
//!
//! Seeded folder -> serpentine layout -> ICF build -> archive.

use newsroom_core::prelude::*;
use newsroom_core::{list_snapshots, load_manifest, run_karma_query, IcfSnapshot, KARMA_QUERY_BLOCK_TYPE};
use newsroom_store::{
    BlobStore, DocumentStore, DocumentStoreExt, MemoryBlobStore, MemoryDocumentStore, HTML_CONTENT_TYPE,
};
use newsroom_test_utils::*;
use newsroom_timeline::{MilestoneImages, Point};
use serde_json::json;

struct Fixture {
    ctx: NewsroomContext,
    clock: Arc<newsroom_core::FixedClock>,
    blobs: Arc<MemoryBlobStore>,
    folder: FolderRepo,
}

async fn fixture() -> Fixture {
    let blobs = Arc::new(MemoryBlobStore::default());
    let (ctx, clock) = context_with_stores(
        NewsroomConfig::new(),
        Arc::new(MemoryDocumentStore::new()),
        blobs.clone(),
        feb_2025(),
    );
    let folder = FolderRepo::new("proj", "folder");
    seed_folder(&ctx, &folder, &scenario_rows(), 2).await;
    Fixture {
        ctx,
        clock,
        blobs,
        folder,
    }
}

fn builder(ctx: &NewsroomContext) -> SnapshotBuilder {
    SnapshotBuilder::new(
        ctx.clone(),
        Arc::new(StaticImageFetcher::new()),
        Arc::new(FixedRasterizer::new()),
    )
}

async fn editable(f: &Fixture) -> SerpentineBlock {
    SerpentineBlock::open(f.ctx.clone(), f.folder.block(SERPENTINE_BLOCK), SerpentineMode::Editable)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_serpentine_buckets_and_nodes() {
    let f = fixture().await;
    let serpentine = editable(&f).await;

    let months: Vec<_> = serpentine.buckets().iter().map(|b| b.month.as_str()).collect();
    assert_eq!(months, ["Jan-2025", "Feb-2025"]);
    assert_eq!(serpentine.buckets()[0].rows.len(), 2);
    assert_eq!(serpentine.buckets()[1].rows.len(), 1);

    let nodes = serpentine.nodes();
    assert_eq!(nodes.len(), 3);
    assert!(!nodes[0].is_extra_node);
    assert!(nodes[1].is_extra_node);
    assert_eq!(nodes[1].month, "");
    assert!(!nodes[2].is_extra_node);
    assert_eq!(nodes[2].month, "Feb-2025");
    assert!(serpentine.warnings().is_empty());
}

#[tokio::test]
async fn test_icf_hash_is_reproducible() {
    let f = fixture().await;
    let serpentine = editable(&f).await;
    let surface = RecordingSurface::new(None);
    let builder = builder(&f.ctx);

    let first = builder.build(&f.folder, &serpentine, &surface).await.unwrap();
    f.clock.advance(chrono::Duration::seconds(90));
    let second = builder.build(&f.folder, &serpentine, &surface).await.unwrap();

    assert_eq!(first.content_hash, second.content_hash);
    assert_ne!(first.snapshot_id, second.snapshot_id);
    assert_ne!(first.generated_at, second.generated_at);
    assert!(first.verify());
    assert!(second.verify());
    assert!(first.snapshot_id.starts_with("icf-"));
}

#[tokio::test]
async fn test_icf_html_uploaded() {
    let f = fixture().await;
    let serpentine = editable(&f).await;
    let surface = RecordingSurface::new(Some("transparent"));

    let icf = builder(&f.ctx).build(&f.folder, &serpentine, &surface).await.unwrap();

    let path = format!("proj/folder/icf/{}.html", icf.snapshot_id);
    let blob = f.blobs.get(&path).expect("ICF uploaded");
    assert_eq!(blob.content_type, HTML_CONTENT_TYPE);
    assert_eq!(icf.url, f.blobs.public_url(&path).await.unwrap());

    let html = String::from_utf8(blob.bytes).unwrap();
    assert!(html.contains("application/ld+json"));
    assert!(html.contains(&icf.content_hash.to_string()));
    assert!(html.contains(PREVIEW_DATA_URI));
    assert!(html.contains("Security audit"));

    // Background forced opaque for the render, then restored
    let history = surface.history();
    assert_eq!(history.last().unwrap().as_deref(), Some("transparent"));
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn test_graph_carries_milestones_and_table() {
    let f = fixture().await;
    let serpentine = editable(&f).await;
    let icf: IcfSnapshot = builder(&f.ctx)
        .build(&f.folder, &serpentine, &RecordingSurface::default())
        .await
        .unwrap();

    let snapshot = icf.graph.node("#snapshot").unwrap();
    assert_eq!(snapshot.get("snapshotId"), Some(&json!(icf.snapshot_id)));
    assert_eq!(snapshot.get("contentHash"), Some(&json!(icf.content_hash.to_string())));
    assert_eq!(snapshot.get("monthsToShow"), Some(&json!(2)));

    assert_eq!(icf.graph.nodes_with_prefix("#milestone-").count(), 3);
    let table = icf.graph.node("#generalTable").unwrap();
    assert_eq!(table.get("rowCount"), Some(&json!(3)));
    assert!(icf.graph.node("#karmaQuery").is_none());
}

#[tokio::test]
async fn test_karma_query_included_when_present() {
    let f = fixture().await;
    let block = f.folder.block(QUERY_BLOCK);
    f.ctx
        .documents()
        .set_as(block.path(), &json!({ "type": KARMA_QUERY_BLOCK_TYPE }))
        .await
        .unwrap();
    let feed = StaticKarmaFeed::new().with_updates("karma", vec![json!({ "title": "Grants portal launch" })]);
    run_karma_query(&f.ctx, &feed, &block, &["karma".to_string(), "missing".to_string()])
        .await
        .unwrap();

    let serpentine = editable(&f).await;
    let icf = builder(&f.ctx)
        .build(&f.folder, &serpentine, &RecordingSurface::default())
        .await
        .unwrap();

    let karma = icf.graph.node("#karmaQuery").unwrap();
    assert_eq!(karma.get("success"), Some(&json!(false)));
    assert_eq!(karma.get("slugs"), Some(&json!(["karma", "missing"])));
}

#[tokio::test]
async fn test_images_inlined_and_digested() {
    let f = fixture().await;
    let mut rows = scenario_rows();
    rows[0].images = Some(MilestoneImages {
        main: Some("https://cdn.example/one.png".to_string()),
        ..MilestoneImages::default()
    });
    rows[2].images = Some(MilestoneImages {
        main: Some("https://cdn.example/gone.png".to_string()),
        ..MilestoneImages::default()
    });
    seed_folder(&f.ctx, &f.folder, &rows, 2).await;

    let fetcher = Arc::new(StaticImageFetcher::new().with_png("https://cdn.example/one.png", &[0x89, 0x50, 0x4e, 0x47]));
    let builder = SnapshotBuilder::new(f.ctx.clone(), fetcher, Arc::new(FixedRasterizer::new()));
    let serpentine = editable(&f).await;
    let icf = builder
        .build(&f.folder, &serpentine, &RecordingSurface::default())
        .await
        .unwrap();

    let inlined = icf.graph.node("#milestone-0").unwrap();
    assert!(inlined.get("imageDigests").is_some());
    // A failed fetch drops only that image
    let missing = icf.graph.node("#milestone-2").unwrap();
    assert!(missing.get("imageDigests").is_none());

    let html = String::from_utf8(f.blobs.get(&f.folder.icf_blob_path(&icf.snapshot_id)).unwrap().bytes).unwrap();
    assert!(html.contains("data:image/png;base64,iVBORw=="));
}

#[tokio::test]
async fn test_failed_render_aborts_build() {
    let f = fixture().await;
    let serpentine = editable(&f).await;
    let builder = SnapshotBuilder::new(
        f.ctx.clone(),
        Arc::new(StaticImageFetcher::new()),
        Arc::new(FixedRasterizer::failing()),
    );
    let surface = RecordingSurface::new(Some("transparent"));

    let result = builder.build(&f.folder, &serpentine, &surface).await;
    assert!(matches!(result, Err(NewsroomError::Raster(_))));
    assert!(f.blobs.is_empty());
    assert_eq!(surface.background().as_deref(), Some("transparent"));
}

#[tokio::test]
async fn test_publish_archives_folder() {
    let f = fixture().await;
    let serpentine = editable(&f).await;
    let published = builder(&f.ctx)
        .publish(&f.folder, &serpentine, &RecordingSurface::default(), Some("editor@example.com".to_string()))
        .await
        .unwrap();

    assert!(published.archive.success);
    let snapshot = f.folder.snapshot(published.snapshot.snapshot_id.clone());
    let manifest = load_manifest(&f.ctx, &snapshot).await.unwrap();
    assert_eq!(manifest.content_hash, published.snapshot.content_hash.to_string());
    assert_eq!(manifest.icf_url, published.snapshot.url);
    assert_eq!(manifest.source_block_id.as_deref(), Some(SERPENTINE_BLOCK));
    assert_eq!(manifest.created_by.as_deref(), Some("editor@example.com"));
    assert!(manifest.storage_archived);
    assert!(manifest.block_ids.contains(&TABLE_BLOCK.to_string()));

    let archived_table = f
        .ctx
        .documents()
        .get(&snapshot.block(TABLE_BLOCK).general_table())
        .await
        .unwrap();
    assert!(archived_table.is_some());
    assert!(f.blobs.get(&f.folder.archive_blob_path(&manifest.snapshot_id)).is_some());

    let listed = list_snapshots(&f.ctx, &f.folder).await.unwrap();
    assert_eq!(listed.len(), 1);
}

#[tokio::test]
async fn test_archived_serpentine_is_read_only() {
    let f = fixture().await;
    let serpentine = editable(&f).await;
    let published = builder(&f.ctx)
        .publish(&f.folder, &serpentine, &RecordingSurface::default(), None)
        .await
        .unwrap();
    let snapshot = f.folder.snapshot(published.snapshot.snapshot_id);

    // Live edits after archiving do not reach the archive
    let mut live = editable(&f).await;
    live.set_months_to_show(6).await.unwrap();

    let mut archived = SerpentineBlock::open(f.ctx.clone(), snapshot.block(SERPENTINE_BLOCK), SerpentineMode::ReadOnly)
        .await
        .unwrap();
    assert_eq!(archived.months_to_show().get(), 2);
    assert_eq!(archived.nodes().len(), 3);

    let drag = archived.begin_drag(1, 0, Point::new(0.0, 0.0), Point::new(0.0, 0.0), 120.0);
    assert!(matches!(drag, Err(NewsroomError::ReadOnly(_))));
    assert!(matches!(archived.set_months_to_show(4).await, Err(NewsroomError::ReadOnly(_))));
}

#[tokio::test]
async fn test_dragged_positions_persist() {
    let f = fixture().await;
    let mut serpentine = editable(&f).await;

    serpentine
        .begin_drag(7, 2, Point::new(100.0, 100.0), Point::new(40.0, 60.0), 120.0)
        .unwrap();
    let update = serpentine.drag_move(7, Point::new(130.0, 150.0)).unwrap();
    assert_eq!(update.node_index, 2);
    let saved = serpentine.end_drag(7).await.unwrap();
    assert_eq!(saved.len(), 1);

    let reopened = editable(&f).await;
    assert_eq!(reopened.positions(), &saved);
    assert_eq!(reopened.card_position(2).unwrap(), serpentine.card_position(2).unwrap());
}
