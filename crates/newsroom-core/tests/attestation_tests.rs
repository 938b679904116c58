//! Attestation portal tests
//!
//! Each test publishes a snapshot, then attests milestones of the archive.

use async_trait::async_trait;
use mockall::mock;
use newsroom_core::prelude::*;
use newsroom_core::{load_manifest, AttestationRequest, AttestationService, AttestationType, BASE_CHAIN_ID};
use newsroom_store::DocumentStoreExt;
use newsroom_test_utils::*;
use serde_json::json;

mock! {
    pub Eas {}

    #[async_trait]
    impl AttestationService for Eas {
        async fn submit(&self, schema_uid: &str, encoded: &[u8]) -> anyhow::Result<String>;
    }
}

const ATTESTER: &str = "0xAbC0000000000000000000000000000000000001";
const OUTCOMES_UID: &str = "0xoutcomes";
const REPORTING_UID: &str = "0xreporting";

fn config() -> NewsroomConfig {
    NewsroomConfig::new()
        .with_schema_uids(OUTCOMES_UID, REPORTING_UID)
        .with_authorized_attesters([ATTESTER])
}

struct Published {
    ctx: NewsroomContext,
    clock: Arc<newsroom_core::FixedClock>,
    snapshot: SnapshotRepo,
}

async fn published() -> Published {
    let (ctx, clock) = fixed_context(config(), feb_2025());
    let folder = FolderRepo::new("proj", "folder");
    seed_folder(&ctx, &folder, &scenario_rows(), 2).await;
    let serpentine = SerpentineBlock::open(ctx.clone(), folder.block(SERPENTINE_BLOCK), SerpentineMode::Editable)
        .await
        .unwrap();
    let builder = SnapshotBuilder::new(
        ctx.clone(),
        Arc::new(StaticImageFetcher::new()),
        Arc::new(FixedRasterizer::new()),
    );
    let result = builder
        .publish(&folder, &serpentine, &RecordingSurface::default(), None)
        .await
        .unwrap();
    Published {
        snapshot: folder.snapshot(result.snapshot.snapshot_id),
        ctx,
        clock,
    }
}

fn request(kind: AttestationType, milestone_index: usize, score: i64) -> AttestationRequest {
    AttestationRequest {
        attestation_type: kind,
        milestone_index,
        score,
        comment: "Delivered as described".to_string(),
        discussion_id: "disc-42".to_string(),
    }
}

fn portal(p: &Published, service: Arc<dyn AttestationService>, wallet: StaticWallet) -> AttestationPortal {
    AttestationPortal::new(p.ctx.clone(), service, Arc::new(wallet))
}

#[tokio::test]
async fn test_resubmission_replaces_previous_record() {
    let p = published().await;
    let service = Arc::new(RecordingAttestationService::new());
    let portal = portal(&p, service.clone(), StaticWallet::connected(ATTESTER, BASE_CHAIN_ID));

    let first = portal
        .submit(&p.snapshot, request(AttestationType::Outcomes, 1, 60))
        .await
        .unwrap();
    p.clock.advance(chrono::Duration::seconds(30));
    let second = portal
        .submit(&p.snapshot, request(AttestationType::Outcomes, 1, 85))
        .await
        .unwrap();

    assert_eq!(second.replaces.as_deref(), Some(first.id.as_str()));
    let records = portal.attestations(&p.snapshot).await.unwrap();
    assert_eq!(records.len(), 2);
    let old = records.iter().find(|r| r.id == first.id).unwrap();
    assert!(!old.is_active);
    assert_eq!(old.replaced_by.as_deref(), Some(second.id.as_str()));
    assert_eq!(records.iter().filter(|r| r.is_active).count(), 1);

    let active = portal
        .active_attestation(&p.snapshot, 1, &ATTESTER.to_lowercase(), AttestationType::Outcomes)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.score, 85);
    assert_eq!(active.onchain_uid, "0xattestation0002");
    assert_eq!(service.submissions().len(), 2);
}

#[tokio::test]
async fn test_types_are_attested_independently() {
    let p = published().await;
    let portal = portal(
        &p,
        Arc::new(RecordingAttestationService::new()),
        StaticWallet::connected(ATTESTER, BASE_CHAIN_ID),
    );

    let outcomes = portal
        .submit(&p.snapshot, request(AttestationType::Outcomes, 0, 70))
        .await
        .unwrap();
    p.clock.advance(chrono::Duration::seconds(1));
    let reporting = portal
        .submit(&p.snapshot, request(AttestationType::Reporting, 0, 40))
        .await
        .unwrap();

    assert!(reporting.replaces.is_none());
    assert_eq!(outcomes.schema_uid, OUTCOMES_UID);
    assert_eq!(reporting.schema_uid, REPORTING_UID);
    let records = portal.attestations(&p.snapshot).await.unwrap();
    assert!(records.iter().all(|r| r.is_active));
}

#[tokio::test]
async fn test_payload_references_archived_snapshot() {
    let p = published().await;
    let service = Arc::new(RecordingAttestationService::new());
    let portal = portal(&p, service.clone(), StaticWallet::connected(ATTESTER, BASE_CHAIN_ID));

    let rows = portal.load_rows(&p.snapshot).await.unwrap();
    let record = portal
        .submit(&p.snapshot, request(AttestationType::Outcomes, 2, 100))
        .await
        .unwrap();
    assert_eq!(record.milestone_summary, rows[2].summary);
    assert_eq!(record.attester_wallet, ATTESTER.to_lowercase());

    let manifest = load_manifest(&p.ctx, &p.snapshot).await.unwrap();
    let (schema_uid, encoded) = service.submissions().remove(0);
    assert_eq!(schema_uid, OUTCOMES_UID);
    // Score, then the content hash as the ninth head word
    assert_eq!(encoded[31], 100);
    assert_eq!(hex::encode(&encoded[8 * 32..9 * 32]), manifest.content_hash);
    let url = manifest.icf_url.as_bytes();
    assert!(encoded.windows(url.len()).any(|w| w == url));
}

#[tokio::test]
async fn test_unauthorized_wallet_rejected() {
    let p = published().await;
    let mut eas = MockEas::new();
    eas.expect_submit().never();
    let portal = portal(
        &p,
        Arc::new(eas),
        StaticWallet::connected("0x9999999999999999999999999999999999999999", BASE_CHAIN_ID),
    );

    let result = portal
        .submit(&p.snapshot, request(AttestationType::Outcomes, 0, 50))
        .await;
    assert!(matches!(result, Err(NewsroomError::Unauthorized(_))));
}

#[tokio::test]
async fn test_score_out_of_range_rejected() {
    let p = published().await;
    let mut eas = MockEas::new();
    eas.expect_submit().never();
    let portal = portal(&p, Arc::new(eas), StaticWallet::connected(ATTESTER, BASE_CHAIN_ID));

    for score in [0, 101, -5] {
        let err = portal
            .submit(&p.snapshot, request(AttestationType::Outcomes, 0, score))
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("score"));
    }
}

#[tokio::test]
async fn test_milestone_index_out_of_range_rejected() {
    let p = published().await;
    let mut eas = MockEas::new();
    eas.expect_submit().never();
    let portal = portal(&p, Arc::new(eas), StaticWallet::connected(ATTESTER, BASE_CHAIN_ID));

    let err = portal
        .submit(&p.snapshot, request(AttestationType::Outcomes, 3, 50))
        .await
        .unwrap_err();
    assert_eq!(err.field(), Some("milestoneIndex"));
}

#[tokio::test]
async fn test_wallet_switched_to_target_chain() {
    let p = published().await;
    let mut eas = MockEas::new();
    eas.expect_submit()
        .withf(|uid, _| uid == OUTCOMES_UID)
        .times(1)
        .returning(|_, _| Ok("0xonchain".to_string()));
    let wallet = Arc::new(StaticWallet::connected(ATTESTER, 1));
    let portal = AttestationPortal::new(p.ctx.clone(), Arc::new(eas), wallet.clone());

    let record = portal
        .submit(&p.snapshot, request(AttestationType::Outcomes, 0, 75))
        .await
        .unwrap();
    assert_eq!(record.onchain_uid, "0xonchain");
    assert_eq!(wallet.switches(), 1);
}

#[tokio::test]
async fn test_refused_chain_switch_aborts() {
    let p = published().await;
    let mut eas = MockEas::new();
    eas.expect_submit().never();
    let portal = portal(
        &p,
        Arc::new(eas),
        StaticWallet::connected(ATTESTER, 1).refusing_switch(),
    );

    let result = portal
        .submit(&p.snapshot, request(AttestationType::Outcomes, 0, 75))
        .await;
    assert!(matches!(result, Err(NewsroomError::Wallet(_))));
}

#[tokio::test]
async fn test_missing_wallet_rejected() {
    let p = published().await;
    let mut eas = MockEas::new();
    eas.expect_submit().never();
    let portal = portal(&p, Arc::new(eas), StaticWallet::disconnected());

    assert!(portal.connect_eagerly().await.is_none());
    let result = portal
        .submit(&p.snapshot, request(AttestationType::Outcomes, 0, 75))
        .await;
    assert!(matches!(result, Err(NewsroomError::Wallet(_))));
}

#[tokio::test]
async fn test_malformed_content_hash_rejected() {
    let p = published().await;
    p.ctx
        .documents()
        .merge_as(&p.snapshot.manifest(), &json!({ "contentHash": "0xnot-a-hash" }))
        .await
        .unwrap();
    let mut eas = MockEas::new();
    eas.expect_submit().never();
    let portal = portal(&p, Arc::new(eas), StaticWallet::connected(ATTESTER, BASE_CHAIN_ID));

    let result = portal
        .submit(&p.snapshot, request(AttestationType::Outcomes, 0, 75))
        .await;
    assert!(matches!(result, Err(NewsroomError::Hash(_))));
}

#[tokio::test]
async fn test_failed_submission_records_nothing() {
    let p = published().await;
    let mut eas = MockEas::new();
    eas.expect_submit()
        .times(1)
        .returning(|_, _| Err(anyhow::anyhow!("execution reverted")));
    let portal = portal(&p, Arc::new(eas), StaticWallet::connected(ATTESTER, BASE_CHAIN_ID));

    let result = portal
        .submit(&p.snapshot, request(AttestationType::Outcomes, 0, 75))
        .await;
    assert!(matches!(result, Err(NewsroomError::Attestation(_))));
    assert!(portal.attestations(&p.snapshot).await.unwrap().is_empty());
}
