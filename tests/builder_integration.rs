mod common;

use cms_index::IndexError;
use cms_index::builder::delivery::{
    ANCESTOR_IDS, CONTENT_TYPE, ContentIndexHandler, ContentIndexHandlerCollection, CULTURE,
    IndexField, ITEM_ID, NAME,
};
use cms_index::builder::property_editors::{self, PropertyEditorCollection, strip_html};
use cms_index::builder::{
    ContentValueSetBuilder, DeliveryApiContentValueSetBuilder, MediaValueSetBuilder,
    MemberValueSetBuilder, ValueSetBuilder,
};
use cms_index::domain::{Content, Property, PropertyData, PropertyValue};
use cms_index::value_set::{FieldKey, FieldValue, IndexCategory, fields};
use common::{FakeUserService, content, media, member, variant_content};
use std::sync::Arc;
use std::sync::atomic::Ordering;

fn editors() -> Arc<PropertyEditorCollection> {
    Arc::new(PropertyEditorCollection::with_defaults())
}

fn texts(values: &[FieldValue]) -> Vec<String> {
    values.iter().map(FieldValue::as_index_string).collect()
}

#[tokio::test]
async fn content_value_set_carries_tree_and_system_fields() -> Result<(), IndexError> {
    let users = Arc::new(FakeUserService::new(&[(7, "Editor Ed")]));
    let builder = ContentValueSetBuilder::new(editors(), users.clone(), false);

    let home = content(1050, None, "Home");
    let mut about = content(1060, Some(&home), "About Us");
    about.entity.creator_id = 7;
    about.entity.writer_id = 7;

    let sets = builder.get_value_sets(&[home, about.clone()]).await?;
    assert_eq!(sets.len(), 2);

    // One user lookup for the whole batch
    assert_eq!(users.lookups.load(Ordering::SeqCst), 1);

    let set = &sets[1];
    assert_eq!(set.id(), "1060");
    assert_eq!(set.category(), &IndexCategory::Content);
    assert_eq!(set.item_type(), "page");
    assert_eq!(set.first_value(fields::PATH).as_deref(), Some("-1,1050,1060"));
    assert_eq!(set.first_value(fields::LEVEL).as_deref(), Some("2"));
    assert_eq!(set.first_value(fields::PARENT_ID).as_deref(), Some("1050"));
    assert_eq!(set.first_value(fields::NODE_NAME).as_deref(), Some("About Us"));
    assert_eq!(set.first_value(fields::URL_NAME).as_deref(), Some("about-us"));
    assert_eq!(set.first_value(fields::NODE_TYPE).as_deref(), Some("1000"));
    assert_eq!(set.first_value(fields::CREATOR_NAME).as_deref(), Some("Editor Ed"));
    assert_eq!(set.first_value(fields::WRITER_NAME).as_deref(), Some("Editor Ed"));
    assert_eq!(set.first_value(fields::PUBLISHED).as_deref(), Some("y"));
    assert_eq!(set.first_value(fields::VARIES_BY_CULTURE).as_deref(), Some("n"));
    assert_eq!(set.first_value(fields::NODE_TYPE_ALIAS_SPECIAL).as_deref(), Some("page"));
    assert_eq!(
        set.first_value(fields::KEY_SPECIAL),
        Some(about.entity.key.to_string())
    );

    Ok(())
}

#[tokio::test]
async fn unknown_users_leave_name_fields_out() -> Result<(), IndexError> {
    let builder = ContentValueSetBuilder::new(editors(), Arc::new(FakeUserService::default()), false);

    let mut item = content(1050, None, "Home");
    item.entity.creator_id = 99;

    let sets = builder.get_value_sets(&[item]).await?;
    assert!(sets[0].get_invariant(fields::CREATOR_NAME).is_none());
    assert_eq!(sets[0].first_value(fields::CREATOR_ID).as_deref(), Some("99"));

    Ok(())
}

#[tokio::test]
async fn variant_content_writes_culture_suffixed_fields() -> Result<(), IndexError> {
    let builder = ContentValueSetBuilder::new(editors(), Arc::new(FakeUserService::default()), false);
    let item = variant_content(1050, None, &[("en-US", "Home", true), ("fr-FR", "Accueil", false)]);

    let sets = builder.get_value_sets(&[item]).await?;
    let set = &sets[0];

    assert_eq!(set.first_value(fields::VARIES_BY_CULTURE).as_deref(), Some("y"));
    assert_eq!(
        texts(set.get(&FieldKey::cultured(fields::NODE_NAME, "en-us")).unwrap()),
        vec!["Home"]
    );
    assert_eq!(
        texts(set.get(&FieldKey::cultured(fields::NODE_NAME, "fr-fr")).unwrap()),
        vec!["Accueil"]
    );
    assert_eq!(
        texts(set.get(&FieldKey::cultured(fields::PUBLISHED, "fr-fr")).unwrap()),
        vec!["n"]
    );
    assert!(set.contains_key(&FieldKey::cultured(fields::URL_NAME, "en-us")));
    assert!(set.contains_key(&FieldKey::cultured(fields::UPDATE_DATE, "fr-fr")));

    Ok(())
}

#[tokio::test]
async fn published_builder_reads_published_values() -> Result<(), IndexError> {
    let users = Arc::new(FakeUserService::default());
    let mut item = content(1050, None, "Draft Name");
    item.publish_name = Some("Live Name".to_string());
    item.properties.push(Property {
        alias: "title".to_string(),
        editor_alias: property_editors::TEXT_BOX.to_string(),
        varies_by_culture: false,
        values: vec![PropertyValue {
            culture: None,
            edited: Some(PropertyData::Text("edited title".to_string())),
            published: Some(PropertyData::Text("published title".to_string())),
        }],
    });

    let all = ContentValueSetBuilder::new(editors(), users.clone(), false)
        .get_value_sets(std::slice::from_ref(&item))
        .await?;
    let published = ContentValueSetBuilder::new(editors(), users, true)
        .get_value_sets(&[item])
        .await?;

    assert_eq!(all[0].first_value(fields::NODE_NAME).as_deref(), Some("Draft Name"));
    assert_eq!(all[0].first_value("title").as_deref(), Some("edited title"));
    assert_eq!(published[0].first_value(fields::NODE_NAME).as_deref(), Some("Live Name"));
    assert_eq!(published[0].first_value("title").as_deref(), Some("published title"));

    Ok(())
}

#[tokio::test]
async fn property_editors_shape_field_values() -> Result<(), IndexError> {
    let builder = ContentValueSetBuilder::new(editors(), Arc::new(FakeUserService::default()), false);

    let mut item = content(1050, None, "Home");
    item.properties = vec![
        Property::invariant(
            "tags",
            property_editors::TAGS,
            PropertyData::Text("news, sport,, weather ".to_string()),
        ),
        Property::invariant(
            "bodyText",
            property_editors::RICH_TEXT,
            PropertyData::Text("<p>Hello <b>world</b></p>".to_string()),
        ),
        Property::invariant("price", property_editors::NUMERIC, PropertyData::Text("12.5".to_string())),
        Property::invariant("mystery", "unknown.editor", PropertyData::Text("ignored".to_string())),
    ];

    let sets = builder.get_value_sets(&[item]).await?;
    let set = &sets[0];

    // One value per tag, blanks dropped
    assert_eq!(
        texts(set.get_invariant("tags").unwrap()),
        vec!["news", "sport", "weather"]
    );
    assert_eq!(set.first_value("bodyText").as_deref(), Some("Hello world"));
    assert_eq!(
        set.get_invariant("__Raw_bodyText").unwrap(),
        &[FieldValue::Raw("<p>Hello <b>world</b></p>".to_string())]
    );
    assert_eq!(set.get_invariant("price").unwrap(), &[FieldValue::Decimal(12.5)]);
    assert!(set.get_invariant("mystery").is_none());

    Ok(())
}

#[tokio::test]
async fn variant_properties_repeat_per_culture() -> Result<(), IndexError> {
    let builder = ContentValueSetBuilder::new(editors(), Arc::new(FakeUserService::default()), false);

    let mut item = variant_content(1050, None, &[("en-us", "Home", true), ("da-dk", "Hjem", true)]);
    item.properties.push(Property {
        alias: "title".to_string(),
        editor_alias: property_editors::TEXT_BOX.to_string(),
        varies_by_culture: true,
        values: vec![
            PropertyValue {
                culture: Some("en-us".to_string()),
                edited: Some(PropertyData::Text("Welcome".to_string())),
                published: None,
            },
            PropertyValue {
                culture: Some("da-dk".to_string()),
                edited: Some(PropertyData::Text("Velkommen".to_string())),
                published: None,
            },
        ],
    });

    let sets = builder.get_value_sets(&[item]).await?;
    let set = &sets[0];

    assert_eq!(
        texts(set.get(&FieldKey::cultured("title", "en-us")).unwrap()),
        vec!["Welcome"]
    );
    assert_eq!(
        texts(set.get(&FieldKey::cultured("title", "da-dk")).unwrap()),
        vec!["Velkommen"]
    );
    assert!(set.get_invariant("title").is_none());

    Ok(())
}

#[tokio::test]
async fn property_cannot_overwrite_system_field() -> Result<(), IndexError> {
    let builder = ContentValueSetBuilder::new(editors(), Arc::new(FakeUserService::default()), false);

    let mut item = content(1050, None, "Home");
    item.properties.push(Property::invariant(
        fields::PATH,
        property_editors::TEXT_BOX,
        PropertyData::Text("-1,666".to_string()),
    ));

    let sets = builder.get_value_sets(&[item]).await?;
    assert_eq!(
        sets[0].get_invariant(fields::PATH).unwrap(),
        &[FieldValue::Raw("-1,1050".to_string())]
    );

    Ok(())
}

#[tokio::test]
async fn media_and_member_builders_tag_their_category() -> Result<(), IndexError> {
    let media_sets = MediaValueSetBuilder::new(editors(), Arc::new(FakeUserService::default()))
        .get_value_sets(&[media(2001, None, "Logo")])
        .await?;
    assert_eq!(media_sets[0].category(), &IndexCategory::Media);
    assert_eq!(media_sets[0].item_type(), "image");
    assert_eq!(
        media_sets[0].first_value(fields::MEDIA_FILE).as_deref(),
        Some("/media/logo.jpg")
    );

    let member_sets = MemberValueSetBuilder::new(editors())
        .get_value_sets(&[member(3001, "alice")])
        .await?;
    assert_eq!(member_sets[0].category(), &IndexCategory::Member);
    assert_eq!(member_sets[0].first_value(fields::LOGIN_NAME).as_deref(), Some("alice"));
    assert_eq!(
        member_sets[0].first_value(fields::EMAIL).as_deref(),
        Some("alice@example.com")
    );

    Ok(())
}

#[tokio::test]
async fn delivery_builder_emits_one_document_per_published_culture() -> Result<(), IndexError> {
    let builder = DeliveryApiContentValueSetBuilder::new(Arc::new(ContentIndexHandlerCollection::with_defaults()));

    let home = content(1050, None, "Home");
    let page = variant_content(
        1060,
        Some(&home),
        &[("en-US", "Products", true), ("fr-FR", "Produits", true), ("de-DE", "Produkte", false)],
    );

    let sets = builder.get_value_sets(&[home.clone(), page.clone()]).await?;
    let ids: Vec<&str> = sets.iter().map(|s| s.id()).collect();
    assert_eq!(
        ids,
        vec![
            home.entity.key.to_string(),
            format!("{}|en-us", page.entity.key),
            format!("{}|fr-fr", page.entity.key),
        ]
    );

    let french = &sets[2];
    assert_eq!(french.first_value(CULTURE).as_deref(), Some("fr-fr"));
    assert_eq!(french.first_value(NAME).as_deref(), Some("Produits"));
    assert_eq!(french.first_value(CONTENT_TYPE).as_deref(), Some("page"));
    assert_eq!(french.first_value(ITEM_ID), Some(page.entity.key.to_string()));
    assert_eq!(
        texts(french.get_invariant(ANCESTOR_IDS).unwrap()),
        vec!["1050"]
    );

    Ok(())
}

#[tokio::test]
async fn delivery_builder_skips_unpublished_content() -> Result<(), IndexError> {
    let builder = DeliveryApiContentValueSetBuilder::new(Arc::new(ContentIndexHandlerCollection::with_defaults()));

    let mut draft = content(1050, None, "Draft");
    draft.published = false;

    assert!(builder.get_value_sets(&[draft]).await?.is_empty());
    Ok(())
}

struct ShadowingIndexer;

impl ContentIndexHandler for ShadowingIndexer {
    fn name(&self) -> &str {
        "shadow"
    }

    fn fields(&self, _content: &Content, _culture: Option<&str>) -> Vec<IndexField> {
        vec![
            IndexField::single("Name", "shadowed"),
            IndexField::single("campaign", "spring"),
        ]
    }
}

#[tokio::test]
async fn delivery_handler_fields_are_first_write_wins() -> Result<(), IndexError> {
    let handlers = ContentIndexHandlerCollection::with_defaults().push(Arc::new(ShadowingIndexer));
    let builder = DeliveryApiContentValueSetBuilder::new(Arc::new(handlers));

    let sets = builder.get_value_sets(&[content(1050, None, "Home")]).await?;
    let set = &sets[0];

    assert_eq!(set.first_value(NAME).as_deref(), Some("Home"));
    assert!(set.get_invariant("Name").is_none());
    assert_eq!(set.first_value("campaign").as_deref(), Some("spring"));

    Ok(())
}

#[test]
fn strip_html_collapses_markup() {
    assert_eq!(strip_html("<h1>Title</h1><p>Body  text</p>"), "Title Body text");
    assert_eq!(strip_html("plain"), "plain");
    assert_eq!(strip_html(""), "");
}
