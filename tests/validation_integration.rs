mod common;

use cms_index::IndexError;
use cms_index::builder::property_editors::PropertyEditorCollection;
use cms_index::builder::{ContentValueSetBuilder, ValueSetBuilder};
use cms_index::domain::{RECYCLE_BIN_CONTENT, RECYCLE_BIN_MEDIA};
use cms_index::scope::DefaultScopeProvider;
use cms_index::validation::{
    ContentValueSetValidator, DEFAULT_MEMBER_INDEX_FIELDS, ValidationStatus, Validator,
    ValueSetValidator,
};
use cms_index::value_set::{FieldKey, FieldValue, FieldValues, IndexCategory, ValueSet, fields};
use common::{FakePublicAccess, FakeUserService, variant_content};
use std::sync::Arc;

fn value_set(category: IndexCategory, item_type: &str, path: &str, published: bool) -> ValueSet {
    let mut values = FieldValues::new();
    values.insert(FieldKey::invariant(fields::ID), vec![FieldValue::Integer(2002)]);
    values.insert(FieldKey::invariant(fields::NODE_NAME), vec!["Page".into()]);
    values.insert(FieldKey::invariant(fields::PATH), vec![FieldValue::Raw(path.to_string())]);
    values.insert(FieldKey::invariant(fields::PUBLISHED), vec![FieldValue::flag(published)]);
    ValueSet::new("2002", category, item_type, values)
}

fn content_validator(published_values_only: bool) -> ContentValueSetValidator {
    ContentValueSetValidator::new(
        published_values_only,
        true,
        Arc::new(FakePublicAccess::default()),
        Arc::new(DefaultScopeProvider),
    )
}

#[tokio::test]
async fn unpublished_cultures_are_stripped_from_published_index() -> Result<(), IndexError> {
    let builder = ContentValueSetBuilder::new(
        Arc::new(PropertyEditorCollection::with_defaults()),
        Arc::new(FakeUserService::default()),
        true,
    );
    let item = variant_content(1050, None, &[("en-us", "Home", true), ("fr-fr", "Accueil", false)]);
    let sets = builder.get_value_sets(&[item]).await?;

    let result = content_validator(true).validate(&sets[0]);
    assert_eq!(result.status, ValidationStatus::Valid);

    let kept = &result.value_set;
    for base in [fields::NODE_NAME, fields::URL_NAME, fields::UPDATE_DATE] {
        assert!(kept.contains_key(&FieldKey::cultured(base, "en-us")), "{base}_en-us missing");
        assert!(!kept.contains_key(&FieldKey::cultured(base, "fr-fr")), "{base}_fr-fr kept");
    }
    for base in [fields::PATH, fields::ID, fields::LEVEL] {
        assert!(kept.get_invariant(base).is_some(), "{base} missing");
    }

    Ok(())
}

#[test]
fn recycle_bin_is_filtered_only_for_published_indexes() {
    let path = format!("-1,1050,{RECYCLE_BIN_CONTENT},2002");
    let set = value_set(IndexCategory::Content, "page", &path, true);

    assert_eq!(content_validator(true).validate(&set).status, ValidationStatus::Filtered);
    assert_eq!(content_validator(false).validate(&set).status, ValidationStatus::Valid);
}

#[test]
fn media_recycle_bin_uses_media_bin_id() {
    let validator = content_validator(true);

    let trashed = value_set(IndexCategory::Media, "image", &format!("-1,{RECYCLE_BIN_MEDIA},3001"), false);
    assert_eq!(validator.validate(&trashed).status, ValidationStatus::Filtered);

    // The content bin id means nothing for media
    let elsewhere = value_set(IndexCategory::Media, "image", &format!("-1,{RECYCLE_BIN_CONTENT},3001"), false);
    assert_eq!(validator.validate(&elsewhere).status, ValidationStatus::Valid);
}

#[test]
fn unpublished_content_fails_published_index() {
    let set = value_set(IndexCategory::Content, "page", "-1,2002", false);

    assert_eq!(content_validator(true).validate(&set).status, ValidationStatus::Failed);
    assert_eq!(content_validator(false).validate(&set).status, ValidationStatus::Valid);
}

#[test]
fn missing_path_fails() {
    let mut values = FieldValues::new();
    values.insert(FieldKey::invariant(fields::ID), vec![FieldValue::Integer(1)]);
    let set = ValueSet::new("1", IndexCategory::Content, "page", values);

    assert_eq!(content_validator(false).validate(&set).status, ValidationStatus::Failed);
}

#[test]
fn parent_restriction_filters_items_outside_the_branch() {
    let validator = content_validator(false).with_parent_id(Some(1050));

    let inside = value_set(IndexCategory::Content, "page", "-1,1050,2002", true);
    let outside = value_set(IndexCategory::Content, "page", "-1,1070,2002", true);

    assert_eq!(validator.validate(&inside).status, ValidationStatus::Valid);
    assert_eq!(validator.validate(&outside).status, ValidationStatus::Filtered);
    assert!(validator.validate_path("-1,1050,2002"));
    assert!(!validator.validate_path("-1,10500,2002"));
}

#[test]
fn non_positive_parent_id_means_no_restriction() {
    let validator = content_validator(false).with_parent_id(Some(-1));
    assert_eq!(validator.parent_id(), None);
    assert!(validator.validate_path("-1,2002"));
}

#[test]
fn protected_content_is_filtered_when_unsupported() {
    let public_access = Arc::new(FakePublicAccess::default());
    public_access.protect(1050);
    let validator = ContentValueSetValidator::new(true, false, public_access, Arc::new(DefaultScopeProvider));

    let protected = value_set(IndexCategory::Content, "page", "-1,1050,2002", true);
    let open = value_set(IndexCategory::Content, "page", "-1,1070,2002", true);

    assert_eq!(validator.validate(&protected).status, ValidationStatus::Filtered);
    assert_eq!(validator.validate(&open).status, ValidationStatus::Valid);
}

#[test]
fn wrong_category_or_type_fails() {
    let validator = content_validator(false).with_item_types(vec![], vec!["secret".to_string()]);

    let member = value_set(IndexCategory::Member, "member", "-1,2002", true);
    assert_eq!(validator.validate(&member).status, ValidationStatus::Failed);

    let excluded = value_set(IndexCategory::Content, "Secret", "-1,2002", true);
    assert_eq!(validator.validate(&excluded).status, ValidationStatus::Failed);

    let included_only = ValueSetValidator::new(None).with_item_types(vec!["page".to_string()], vec![]);
    let other = value_set(IndexCategory::Content, "article", "-1,2002", true);
    assert_eq!(included_only.validate(&other).status, ValidationStatus::Failed);
}

#[test]
fn field_lists_filter_by_base_name() {
    let validator = ValueSetValidator::new(None).with_fields(vec![], vec![fields::NODE_NAME.to_string()]);

    let mut set = value_set(IndexCategory::Content, "page", "-1,2002", true);
    let mut values = set.values().clone();
    values.insert(FieldKey::cultured(fields::NODE_NAME, "en-us"), vec!["Home".into()]);
    set = set.with_values(values);

    let result = validator.validate(&set);
    assert_eq!(result.status, ValidationStatus::Valid);
    assert!(result.value_set.get_invariant(fields::NODE_NAME).is_none());
    assert!(!result.value_set.contains_key(&FieldKey::cultured(fields::NODE_NAME, "en-us")));
    assert!(result.value_set.get_invariant(fields::PATH).is_some());
}

#[test]
fn member_validator_keeps_default_fields() {
    let validator = ValueSetValidator::for_members(vec![], vec![]);

    let mut values = FieldValues::new();
    values.insert(FieldKey::invariant(fields::ID), vec![FieldValue::Integer(3001)]);
    values.insert(FieldKey::invariant(fields::LOGIN_NAME), vec!["alice".into()]);
    values.insert(FieldKey::invariant(fields::EMAIL), vec!["alice@example.com".into()]);
    values.insert(FieldKey::invariant("favouriteColour"), vec!["green".into()]);
    let set = ValueSet::new("3001", IndexCategory::Member, "member", values);

    let result = validator.validate(&set);
    assert_eq!(result.status, ValidationStatus::Valid);
    assert!(result.value_set.get_invariant("favouriteColour").is_none());
    for key in result.value_set.values().keys() {
        assert!(DEFAULT_MEMBER_INDEX_FIELDS.contains(&key.base.as_str()));
    }

    let content = value_set(IndexCategory::Content, "page", "-1,2002", true);
    assert_eq!(validator.validate(&content).status, ValidationStatus::Failed);
}

#[tokio::test]
async fn validating_twice_changes_nothing() -> Result<(), IndexError> {
    let builder = ContentValueSetBuilder::new(
        Arc::new(PropertyEditorCollection::with_defaults()),
        Arc::new(FakeUserService::default()),
        true,
    );
    let item = variant_content(1050, None, &[("en-us", "Home", true), ("fr-fr", "Accueil", false)]);
    let sets = builder.get_value_sets(&[item]).await?;

    let validator = content_validator(true).with_fields(vec![], vec![fields::ICON.to_string()]);
    let once = validator.validate(&sets[0]);
    let twice = validator.validate(&once.value_set);

    assert_eq!(once, twice);

    let trashed = value_set(
        IndexCategory::Content,
        "page",
        &format!("-1,{RECYCLE_BIN_CONTENT},2002"),
        true,
    );
    let once = validator.validate(&trashed);
    assert_eq!(validator.validate(&once.value_set), once);

    // An include list must not drop the fields the rules themselves read
    let narrow = content_validator(true).with_fields(vec![fields::NODE_NAME.to_string()], vec![]);
    let once = narrow.validate(&sets[0]);
    assert_eq!(once.status, ValidationStatus::Valid);
    assert!(once.value_set.get_invariant(fields::ICON).is_none());
    assert!(once.value_set.get_invariant(fields::PATH).is_some());
    assert!(once.value_set.contains_key(&FieldKey::cultured(fields::NODE_NAME, "en-us")));
    assert_eq!(narrow.validate(&once.value_set), once);

    Ok(())
}

#[test]
fn validator_describes_its_configuration() {
    let described = content_validator(true)
        .with_parent_id(Some(1050))
        .with_item_types(vec!["page".to_string()], vec![])
        .describe();

    assert_eq!(described.get("PublishedValuesOnly").map(String::as_str), Some("true"));
    assert_eq!(described.get("ParentId").map(String::as_str), Some("1050"));
    assert_eq!(described.get("IncludeItemTypes").map(String::as_str), Some("page"));
    assert_eq!(described.get("ValidCategories").map(String::as_str), Some("content,media"));
}
