mod common;

use cms_index::IndexError;
use cms_index::diagnostics::{IndexDiagnostics, IndexRebuildStatusManager, PopulatorProgress};
use cms_index::scope::DefaultScopeProvider;
use cms_index::search::{IndexOptions, SearchIndex, SqliteIndex};
use cms_index::validation::ContentValueSetValidator;
use cms_index::value_set::{FieldKey, FieldValue, FieldValues, IndexCategory, ValueSet, fields};
use common::FakePublicAccess;
use std::sync::Arc;
use tempfile::TempDir;

fn page(id: i32) -> ValueSet {
    let mut values = FieldValues::new();
    values.insert(FieldKey::invariant(fields::NODE_NAME), vec!["Page".into()]);
    values.insert(FieldKey::invariant(fields::PATH), vec![FieldValue::Raw(format!("-1,1050,{id}"))]);
    values.insert(FieldKey::invariant(fields::PUBLISHED), vec![FieldValue::flag(true)]);
    ValueSet::new(id.to_string(), IndexCategory::Content, "page", values)
}

async fn external_index(dir: &TempDir) -> Result<Arc<dyn SearchIndex>, IndexError> {
    let validator = ContentValueSetValidator::new(
        true,
        false,
        Arc::new(FakePublicAccess::default()),
        Arc::new(DefaultScopeProvider),
    )
    .with_parent_id(Some(1050))
    .with_item_types(vec!["page".to_string()], Vec::new());

    let index = SqliteIndex::open(
        dir.path(),
        IndexOptions::new("ExternalIndex").published_values_only(true),
        Arc::new(validator),
    )
    .await?;
    Ok(Arc::new(index))
}

#[tokio::test]
async fn empty_index_is_healthy() -> Result<(), IndexError> {
    let tmpdir = TempDir::new().unwrap();
    let diagnostics = IndexDiagnostics::new(external_index(&tmpdir).await?);

    let health = diagnostics.is_healthy().await;
    assert!(health.healthy);
    assert!(health.message.is_none());
    assert_eq!(diagnostics.document_count().await?, 0);

    Ok(())
}

#[tokio::test]
async fn metadata_reports_counts_and_validator_settings() -> Result<(), IndexError> {
    let tmpdir = TempDir::new().unwrap();
    let index = external_index(&tmpdir).await?;
    index.index_items(vec![page(1060)]).await?;

    let diagnostics = IndexDiagnostics::new(index);
    let metadata = diagnostics.metadata().await?;

    assert_eq!(metadata["DocumentCount"], "1");
    assert_eq!(
        metadata["FieldCount"],
        diagnostics.field_names().await?.len().to_string()
    );
    assert_eq!(metadata["PublishedValuesOnly"], "true");
    assert_eq!(metadata["EnableDefaultEventHandler"], "true");
    assert_eq!(metadata["SupportProtectedContent"], "false");
    assert_eq!(metadata["ParentId"], "1050");
    assert_eq!(metadata["IncludeItemTypes"], "page");
    assert_eq!(metadata["ValidCategories"], "content,media");
    assert!(!metadata.contains_key("ExcludeFields"));

    Ok(())
}

#[test]
fn status_manager_tracks_a_rebuild() {
    let manager = Arc::new(IndexRebuildStatusManager::new());
    let names = vec!["InternalIndex".to_string(), "ExternalIndex".to_string()];

    assert!(manager.status("InternalIndex").is_none());
    manager.start_rebuild(&names);
    assert!(manager.is_rebuilding("InternalIndex"));
    assert!(manager.is_rebuilding("ExternalIndex"));

    let progress = PopulatorProgress::new(manager.clone(), names.clone(), "ContentIndexPopulator");
    progress.start();
    progress.batch(1, 3);

    let status = manager.status("ExternalIndex").unwrap();
    assert_eq!(status.populators.len(), 1);
    assert!(status.populators[0].is_running);
    assert_eq!(status.populators[0].current_batch, 1);
    assert_eq!(status.populators[0].total_batches, 3);

    manager.finish_rebuild(&names);
    let all = manager.all();
    assert_eq!(all.len(), 2);
    assert!(all.values().all(|s| !s.is_rebuilding));
    assert!(all.values().all(|s| s.populators.iter().all(|p| !p.is_running)));
}

#[test]
fn detached_progress_records_nothing() {
    let progress = PopulatorProgress::detached();
    progress.start();
    progress.batch(2, 2);
    progress.finish();
}

#[test]
fn update_creates_missing_entries() {
    let manager = IndexRebuildStatusManager::new();

    manager.update_populator("MembersIndex", "MemberIndexPopulator", |p| p.total_batches = 4);

    let status = manager.status("MembersIndex").unwrap();
    assert!(!status.is_rebuilding);
    assert_eq!(status.populators[0].name, "MemberIndexPopulator");
    assert_eq!(status.populators[0].total_batches, 4);
}
