//! Integration tests for full synchronization runs against in-memory systems.

use catsync_engine::{
    ChangeSet, ChangeSetState, ConnectionConfiguration, EngineSettings, IndexNotification,
    IndexOperation, IndexType, JobEntryType, MemoryLifecycle, MemorySource, MemoryTarget,
    ProductCategoryService, SyncController, SyncError, SyncJobConfiguration, TargetCall,
    UnitOutcome,
};
use catsync_job::{
    BaseAmountSnapshot, CatalogSnapshot, CategorySnapshot, ChangeKind, DomainSnapshot,
    DomainType, PriceListSnapshot, ProductCategorySnapshot, ProductSkuSnapshot, ProductSnapshot,
    SerializableObject,
};
use std::sync::Arc;

fn catalog(guid: &str) -> SerializableObject {
    SerializableObject::new(
        guid,
        DomainSnapshot::Catalog(CatalogSnapshot {
            code: guid.to_uppercase(),
            master: true,
        }),
    )
}

fn category(guid: &str, parent: Option<&str>) -> SerializableObject {
    SerializableObject::new(
        guid,
        DomainSnapshot::Category(CategorySnapshot {
            code: guid.to_uppercase(),
            catalog_guid: "master".into(),
            parent_guid: parent.map(String::from),
            master_category_guid: None,
        }),
    )
}

fn product(guid: &str, code: &str) -> SerializableObject {
    SerializableObject::new(
        guid,
        DomainSnapshot::Product(ProductSnapshot {
            code: code.into(),
            category_guids: Vec::new(),
        }),
    )
}

fn sku(guid: &str, product_guid: &str) -> SerializableObject {
    SerializableObject::new(
        guid,
        DomainSnapshot::ProductSku(ProductSkuSnapshot {
            sku_code: guid.to_uppercase(),
            product_guid: product_guid.into(),
        }),
    )
}

fn price_list(guid: &str) -> SerializableObject {
    SerializableObject::new(
        guid,
        DomainSnapshot::PriceList(PriceListSnapshot {
            name: guid.into(),
            currency: "USD".into(),
        }),
    )
}

fn amount(guid: &str, product_guid: &str, list_value: i64) -> SerializableObject {
    SerializableObject::new(
        guid,
        DomainSnapshot::BaseAmount(BaseAmountSnapshot {
            price_list_guid: "pl-usd".into(),
            object_guid: product_guid.into(),
            object_type: DomainType::Product,
            quantity: 1,
            list_value,
            sale_value: None,
        }),
    )
}

fn assignment(category_guid: &str, product_code: &str) -> SerializableObject {
    let snapshot = ProductCategorySnapshot {
        category_guid: category_guid.into(),
        product_code: product_code.into(),
    };
    SerializableObject::new(snapshot.guid(), DomainSnapshot::ProductCategory(snapshot))
}

fn config(selector: &str) -> SyncJobConfiguration {
    SyncJobConfiguration::new(selector)
        .with_source(ConnectionConfiguration::new("author", "mem://author"))
        .with_target(ConnectionConfiguration::new("live", "mem://live"))
}

/// A source with one change set that publishes a small catalog, listed
/// children first.
fn catalog_source() -> Arc<MemorySource> {
    let source = Arc::new(MemorySource::new());
    for object in [
        catalog("master"),
        price_list("pl-usd"),
        category("cat-root", None),
        category("cat-child", Some("cat-root")),
        product("p-1", "P1"),
        sku("sku-1", "p-1"),
        amount("ba-1", "p-1", 1000),
        amount("ba-2", "p-1", 900),
        assignment("cat-child", "P1"),
    ] {
        source.put_object(object);
    }
    source.add_change_set(
        ChangeSet::new("cs-catalog")
            .with_state(ChangeSetState::ReadyToPublish)
            .with_member(DomainType::ProductCategory, "cat-child|P1", ChangeKind::Add)
            .with_member(DomainType::BaseAmount, "ba-1", ChangeKind::Add)
            .with_member(DomainType::BaseAmount, "ba-2", ChangeKind::Add)
            .with_member(DomainType::ProductSku, "sku-1", ChangeKind::Add)
            .with_member(DomainType::Product, "p-1", ChangeKind::Add)
            .with_member(DomainType::Category, "cat-child", ChangeKind::Add)
            .with_member(DomainType::Category, "cat-root", ChangeKind::Add)
            .with_member(DomainType::PriceList, "pl-usd", ChangeKind::Add)
            .with_member(DomainType::Catalog, "master", ChangeKind::Add),
    );
    source
}

fn full(source: &Arc<MemorySource>, target: &Arc<MemoryTarget>) -> SyncController {
    SyncController::full(
        &source.system(),
        &target.services(),
        &EngineSettings::default(),
        Arc::new(MemoryLifecycle::new()),
    )
}

fn position(calls: &[TargetCall], call: &TargetCall) -> usize {
    calls
        .iter()
        .position(|c| c == call)
        .unwrap_or_else(|| panic!("{call:?} was not made"))
}

#[test]
fn publishes_catalog_parents_first() {
    let source = catalog_source();
    let target = Arc::new(MemoryTarget::new());

    let summary = full(&source, &target).synchronize(&config("cs-catalog")).unwrap();

    assert!(!summary.has_errors(), "{:?}", summary.sync_errors());
    assert_eq!(summary.success_results().len(), 9);
    assert_eq!(summary.processed_count("cs-catalog"), Some(9));
    assert!(summary.job_id().is_some());

    let calls = target.calls();
    let add = |t: DomainType, guid: &str| position(&calls, &TargetCall::ServiceAdd(t, guid.into()));
    assert!(add(DomainType::Catalog, "master") < add(DomainType::PriceList, "pl-usd"));
    assert!(add(DomainType::PriceList, "pl-usd") < add(DomainType::Category, "cat-root"));
    assert!(add(DomainType::Category, "cat-root") < add(DomainType::Category, "cat-child"));
    assert!(add(DomainType::Category, "cat-child") < add(DomainType::Product, "p-1"));
    assert!(add(DomainType::Product, "p-1") < add(DomainType::ProductSku, "sku-1"));
    assert!(add(DomainType::ProductSku, "sku-1") < add(DomainType::BaseAmount, "ba-1"));
    assert!(
        add(DomainType::BaseAmount, "ba-2")
            < position(&calls, &TargetCall::Assign("cat-child".into(), "P1".into()))
    );

    // One flush per run of same-type objects.
    let flushes = calls.iter().filter(|c| **c == TargetCall::Flush).count();
    assert_eq!(flushes, 7);

    assert!(target.is_assigned("cat-child", "P1").unwrap());
    assert_eq!(target.object(DomainType::ProductSku, "sku-1"), Some(sku("sku-1", "p-1")));
    assert_eq!(source.change_set_state("cs-catalog"), Some(ChangeSetState::Finalized));
    assert_eq!(source.cache_clears(), 1);
}

#[test]
fn price_change_notified_once_per_change_set() {
    let source = catalog_source();
    let target = Arc::new(MemoryTarget::new());

    full(&source, &target).synchronize(&config("cs-catalog")).unwrap();

    let notifications = target.notifications();
    let price_changes: Vec<_> = notifications
        .iter()
        .filter(|n| n.index_type == IndexType::PriceChange)
        .collect();
    assert_eq!(
        price_changes,
        vec![&IndexNotification::new(
            IndexType::PriceChange,
            IndexOperation::Update,
            "cs-catalog"
        )]
    );
    assert!(notifications.contains(&IndexNotification::new(
        IndexType::Product,
        IndexOperation::Update,
        "p-1"
    )));
    assert!(!notifications.iter().any(|n| n.key == "ba-1"));
}

#[test]
fn failing_unit_does_not_stop_the_job() {
    let source = Arc::new(MemorySource::new());
    for guid in ["p-1", "p-bad", "p-3"] {
        source.put_object(product(guid, &guid.to_uppercase()));
    }
    for (name, guid) in [("cs-1", "p-1"), ("cs-2", "p-bad"), ("cs-3", "p-3")] {
        source.add_change_set(ChangeSet::new(name).with_member(
            DomainType::Product,
            guid,
            ChangeKind::Add,
        ));
    }
    let target = Arc::new(MemoryTarget::new());
    target.fail_on(DomainType::Product, "p-bad");

    let summary = full(&source, &target)
        .synchronize(&config("cs-1,cs-2,cs-3"))
        .unwrap();

    assert_eq!(summary.number_of_errors(), 1);
    let error = &summary.sync_errors()[0];
    assert_eq!(error.job_entry_type, JobEntryType::ChangeSet);
    assert_eq!(error.transaction_job_unit_name, "cs-2");
    assert!(error.cause.as_deref().unwrap().contains("p-bad"));

    let outcomes: Vec<_> = summary.units().iter().map(|u| u.outcome).collect();
    assert_eq!(
        outcomes,
        vec![UnitOutcome::Applied, UnitOutcome::Failed, UnitOutcome::Applied]
    );
    let applied: Vec<_> = summary
        .success_results()
        .iter()
        .map(|r| r.job_entry_guid.as_str())
        .collect();
    assert_eq!(applied, vec!["p-1", "p-3"]);

    assert!(target.object(DomainType::Product, "p-1").is_some());
    assert!(target.object(DomainType::Product, "p-bad").is_none());
    assert!(target.object(DomainType::Product, "p-3").is_some());
    assert_eq!(source.change_set_state("cs-2"), Some(ChangeSetState::Open));
    assert!(!target.in_transaction());
}

#[test]
fn unknown_change_set_recorded_by_name() {
    let source = catalog_source();
    let target = Arc::new(MemoryTarget::new());

    let summary = full(&source, &target)
        .synchronize(&config("unknown_cs,cs-catalog"))
        .unwrap();

    assert_eq!(summary.number_of_errors(), 1);
    let error = &summary.sync_errors()[0];
    assert_eq!(error.job_entry_type, JobEntryType::ChangeSet);
    assert_eq!(error.transaction_job_unit_name, "unknown_cs");
    assert_eq!(summary.processed_count("cs-catalog"), Some(9));
}

#[test]
fn deletes_remove_children_first() {
    let source = Arc::new(MemorySource::new());
    source.add_change_set(
        ChangeSet::new("cs-cleanup")
            .with_member(DomainType::Category, "cat-old", ChangeKind::Delete)
            .with_member(DomainType::Product, "p-old", ChangeKind::Delete),
    );
    let target = Arc::new(MemoryTarget::new());
    target.seed(category("cat-old", None));
    target.seed(product("p-old", "OLD"));
    target.seed(sku("sku-old", "p-old"));
    target.seed(amount("ba-old", "sku-old", 100));
    target.seed_assignment("cat-old", "OLD");

    let summary = full(&source, &target).synchronize(&config("cs-cleanup")).unwrap();
    assert!(!summary.has_errors(), "{:?}", summary.sync_errors());

    let calls = target.calls();
    assert!(
        position(&calls, &TargetCall::RemoveSkuTree("sku-old".into()))
            < position(&calls, &TargetCall::ServiceRemove(DomainType::Product, "p-old".into()))
    );
    assert!(
        position(&calls, &TargetCall::ServiceRemove(DomainType::Product, "p-old".into()))
            < position(&calls, &TargetCall::ServiceRemove(DomainType::Category, "cat-old".into()))
    );
    assert_eq!(target.object_count(), 0);
    assert!(!target.is_assigned("cat-old", "OLD").unwrap());
}

#[test]
fn missing_source_object_fails_its_unit() {
    let source = Arc::new(MemorySource::new());
    source.add_change_set(ChangeSet::new("cs-1").with_member(
        DomainType::Product,
        "p-gone",
        ChangeKind::Update,
    ));
    let target = Arc::new(MemoryTarget::new());

    let summary = full(&source, &target).synchronize(&config("cs-1")).unwrap();

    assert_eq!(summary.number_of_errors(), 1);
    assert_eq!(
        summary.sync_errors()[0].cause.as_deref(),
        Some("Product p-gone not found")
    );
}

#[test]
fn sku_of_unknown_product_is_not_committed() {
    let source = Arc::new(MemorySource::new());
    source.put_object(sku("sku-1", "p-missing"));
    source.put_object(product("p-2", "P2"));
    source.add_change_set(ChangeSet::new("cs-1").with_member(
        DomainType::ProductSku,
        "sku-1",
        ChangeKind::Add,
    ));
    source.add_change_set(ChangeSet::new("cs-2").with_member(
        DomainType::Product,
        "p-2",
        ChangeKind::Add,
    ));
    let target = Arc::new(MemoryTarget::new());

    let summary = full(&source, &target).synchronize(&config("cs-1,cs-2")).unwrap();

    assert_eq!(summary.number_of_errors(), 1);
    let error = &summary.sync_errors()[0];
    assert_eq!(error.transaction_job_unit_name, "cs-1");
    assert_eq!(error.cause.as_deref(), Some("Product p-missing not found"));
    assert!(target.object(DomainType::ProductSku, "sku-1").is_none());
    assert!(target.object(DomainType::Product, "p-2").is_some());
    assert_eq!(source.change_set_state("cs-1"), Some(ChangeSetState::Open));
}

#[test]
fn failed_commit_is_recorded() {
    let source = catalog_source();
    let target = Arc::new(MemoryTarget::new());
    target.fail_commits(true);

    let summary = full(&source, &target).synchronize(&config("cs-catalog")).unwrap();

    assert_eq!(summary.number_of_errors(), 1);
    assert_eq!(summary.sync_errors()[0].message, "commit failed");
    assert!(summary.success_results().is_empty());
    assert_eq!(target.object_count(), 0);
    // Nothing committed, so no price change is announced.
    assert!(target.notifications().is_empty());
}

#[test]
fn saved_job_replays_without_source() {
    let dir = tempfile::tempdir().unwrap();
    let source = catalog_source();
    let first = Arc::new(MemoryTarget::new());

    let mut save = SyncController::full_and_save(
        &source.system(),
        &first.services(),
        &EngineSettings::default(),
        Arc::new(MemoryLifecycle::new()),
    );
    let saved = save
        .synchronize(&config("cs-catalog").with_root_path(dir.path()))
        .unwrap();
    assert!(!saved.has_errors());
    let job_id = saved.job_id().unwrap().to_string();
    assert!(dir.path().join(&job_id).join("transaction_job.json").exists());
    assert!(dir.path().join(&job_id).join("descriptor.json").exists());

    // Replay into a second target after the source forgot everything.
    source.remove_object(DomainType::Product, "p-1");
    let second = Arc::new(MemoryTarget::new());
    let mut load = SyncController::load(
        &second.services(),
        &EngineSettings::default(),
        Arc::new(MemoryLifecycle::new()),
    );
    let loaded = load
        .synchronize(
            &SyncJobConfiguration::default()
                .with_target(ConnectionConfiguration::new("dr", "mem://dr"))
                .with_root_path(dir.path())
                .with_sub_dir(job_id.as_str()),
        )
        .unwrap();

    assert!(!loaded.has_errors(), "{:?}", loaded.sync_errors());
    assert_eq!(loaded.success_results().len(), 9);
    assert_eq!(second.object_count(), first.object_count());
    assert_eq!(second.object(DomainType::Product, "p-1"), Some(product("p-1", "P1")));
}

#[test]
fn replay_skips_units_of_unknown_change_sets() {
    let dir = tempfile::tempdir().unwrap();
    let source = catalog_source();
    let first = Arc::new(MemoryTarget::new());

    let saved = SyncController::full_and_save(
        &source.system(),
        &first.services(),
        &EngineSettings::default(),
        Arc::new(MemoryLifecycle::new()),
    )
    .synchronize(&config("unknown_cs,cs-catalog").with_root_path(dir.path()))
    .unwrap();
    assert_eq!(saved.number_of_errors(), 1);
    let job_id = saved.job_id().unwrap().to_string();

    let second = Arc::new(MemoryTarget::new());
    let loaded = SyncController::load(
        &second.services(),
        &EngineSettings::default(),
        Arc::new(MemoryLifecycle::new()),
    )
    .synchronize(
        &SyncJobConfiguration::default()
            .with_target(ConnectionConfiguration::new("dr", "mem://dr"))
            .with_root_path(dir.path())
            .with_sub_dir(job_id.as_str()),
    )
    .unwrap();

    assert!(!loaded.has_errors(), "{:?}", loaded.sync_errors());
    let units: Vec<_> = loaded.units().iter().map(|u| u.name.as_str()).collect();
    assert_eq!(units, vec!["cs-catalog"]);
    assert_eq!(loaded.processed_count("unknown_cs"), None);
    assert_eq!(second.object_count(), first.object_count());
}

#[test]
fn load_of_unknown_job_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let target = Arc::new(MemoryTarget::new());
    let lifecycle = Arc::new(MemoryLifecycle::new());
    let mut load = SyncController::load(&target.services(), &EngineSettings::default(), lifecycle.clone());

    let err = load
        .synchronize(
            &SyncJobConfiguration::default()
                .with_target(ConnectionConfiguration::new("dr", "mem://dr"))
                .with_root_path(dir.path())
                .with_sub_dir("no-such-job"),
        )
        .unwrap_err();

    assert!(matches!(err, SyncError::Job(_)));
    assert_eq!(lifecycle.destroy_count(), 1);
    assert!(!lifecycle.is_open());
}

#[test]
fn export_persists_without_target() {
    let dir = tempfile::tempdir().unwrap();
    let source = catalog_source();
    let mut export = SyncController::export(&source.system(), Arc::new(MemoryLifecycle::new()));

    let summary = export
        .synchronize(
            &SyncJobConfiguration::new("cs-catalog")
                .with_source(ConnectionConfiguration::new("author", "mem://author"))
                .with_root_path(dir.path()),
        )
        .unwrap();

    assert!(!summary.has_errors());
    assert_eq!(summary.success_results().len(), 9);
    let job_id = summary.job_id().unwrap().to_string();
    assert!(dir.path().join(job_id).join("transaction_job.json").exists());
    // Exporting does not publish the change set.
    assert_eq!(source.change_set_state("cs-catalog"), Some(ChangeSetState::ReadyToPublish));
}
