#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use cms_index::IndexResult;
use cms_index::builder::delivery::ContentIndexHandlerCollection;
use cms_index::builder::property_editors::PropertyEditorCollection;
use cms_index::config::{IndexDefinition, IndexingSettings};
use cms_index::diagnostics::IndexRebuildStatusManager;
use cms_index::domain::services::{
    ContentQuery, ContentService, MediaService, MemberService, Ordering, Page,
    PublicAccessService, ServiceContext, UserService,
};
use cms_index::domain::{
    Content, ContentTypeRef, CultureInfo, Media, Member, ROOT_ID, TreeEntity, UserProfile,
};
use cms_index::handler::IndexingHandler;
use cms_index::populate::default_populators;
use cms_index::rebuild::IndexRebuilder;
use cms_index::runtime::{MainDomFlag, RuntimeLevel, RuntimeLevelState};
use cms_index::scope::DefaultScopeProvider;
use cms_index::search::{IndexRegistry, SearchIndex};
use cms_index::tasks::TokioTaskQueue;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use uuid::Uuid;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn page<T: Clone>(items: Vec<T>, page_index: u64, page_size: u64) -> Page<T> {
    let total = items.len() as u64;
    let items = items
        .into_iter()
        .skip((page_index * page_size) as usize)
        .take(page_size as usize)
        .collect();
    Page { items, total }
}

fn in_branch(entity: &TreeEntity, parent_id: i32) -> bool {
    if parent_id == ROOT_ID {
        return true;
    }
    entity.id != parent_id
        && entity
            .path
            .split(',')
            .any(|s| s.parse::<i32>().ok() == Some(parent_id))
}

fn by_path(a: &TreeEntity, b: &TreeEntity) -> std::cmp::Ordering {
    a.level
        .cmp(&b.level)
        .then(a.sort_order.cmp(&b.sort_order))
        .then(a.id.cmp(&b.id))
}

// ============================================================================
// Entity factories
// ============================================================================

pub fn entity(id: i32, parent: Option<&TreeEntity>, name: &str) -> TreeEntity {
    let (parent_id, level, path) = match parent {
        Some(p) => (p.id, p.level + 1, format!("{},{}", p.path, id)),
        None => (ROOT_ID, 1, format!("{},{}", ROOT_ID, id)),
    };
    let date = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    TreeEntity {
        id,
        key: Uuid::new_v4(),
        parent_id,
        level,
        path,
        sort_order: 0,
        name: name.to_string(),
        creator_id: 0,
        writer_id: 0,
        create_date: date,
        update_date: date,
        trashed: false,
    }
}

/// Published invariant content of type `page` (type id 1000).
pub fn content(id: i32, parent: Option<&Content>, name: &str) -> Content {
    Content {
        entity: entity(id, parent.map(|p| &p.entity), name),
        content_type: ContentTypeRef::new(1000, "page").with_icon("icon-document"),
        published: true,
        publish_name: Some(name.to_string()),
        url_segment: name.to_lowercase().replace(' ', "-"),
        template_id: Some(1),
        cultures: BTreeMap::new(),
        properties: Vec::new(),
    }
}

pub fn culture(code: &str, name: &str, published: bool) -> CultureInfo {
    CultureInfo {
        culture: code.to_lowercase(),
        name: name.to_string(),
        publish_name: published.then(|| name.to_string()),
        url_segment: name.to_lowercase().replace(' ', "-"),
        published,
        update_date: Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap(),
    }
}

/// Culture-variant content with one entry per `(code, name, published)`.
pub fn variant_content(id: i32, parent: Option<&Content>, cultures: &[(&str, &str, bool)]) -> Content {
    let mut item = content(id, parent, cultures.first().map(|c| c.1).unwrap_or("variant"));
    item.content_type = item.content_type.variant();
    item.cultures = cultures
        .iter()
        .map(|(code, name, published)| (code.to_lowercase(), culture(code, name, *published)))
        .collect();
    item
}

pub fn media(id: i32, parent: Option<&Media>, name: &str) -> Media {
    Media {
        entity: entity(id, parent.map(|p| &p.entity), name),
        media_type: ContentTypeRef::new(2000, "image").with_icon("icon-picture"),
        url_segment: name.to_lowercase(),
        file_url: Some(format!("/media/{}.jpg", name.to_lowercase())),
        properties: Vec::new(),
    }
}

pub fn member(id: i32, login: &str) -> Member {
    Member {
        entity: entity(id, None, login),
        member_type: ContentTypeRef::new(3000, "member"),
        login_name: login.to_string(),
        email: format!("{login}@example.com"),
        properties: Vec::new(),
    }
}

// ============================================================================
// In-memory services
// ============================================================================

#[derive(Default)]
pub struct FakeContentService {
    items: Mutex<Vec<Content>>,
    pub descendant_calls: AtomicUsize,
}

impl FakeContentService {
    pub fn new(items: Vec<Content>) -> Self {
        Self {
            items: Mutex::new(items),
            descendant_calls: AtomicUsize::new(0),
        }
    }

    pub fn upsert(&self, item: Content) {
        let mut items = self.items.lock().unwrap();
        items.retain(|c| c.id() != item.id());
        items.push(item);
    }

    pub fn remove(&self, id: i32) {
        self.items.lock().unwrap().retain(|c| c.id() != id);
    }

    pub fn calls(&self) -> usize {
        self.descendant_calls.load(AtomicOrdering::SeqCst)
    }
}

#[async_trait]
impl ContentService for FakeContentService {
    async fn get_paged_descendants(
        &self,
        parent_id: i32,
        page_index: u64,
        page_size: u64,
        query: ContentQuery,
    ) -> IndexResult<Page<Content>> {
        self.descendant_calls.fetch_add(1, AtomicOrdering::SeqCst);
        let mut items: Vec<Content> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|c| in_branch(&c.entity, parent_id))
            .filter(|c| !query.published_only || c.published)
            .cloned()
            .collect();
        if query.ordering == Ordering::PathAscending {
            items.sort_by(|a, b| by_path(&a.entity, &b.entity));
        }
        Ok(page(items, page_index, page_size))
    }

    async fn get_root_content(&self) -> IndexResult<Vec<Content>> {
        Ok(self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.entity.level == 1)
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, id: i32) -> IndexResult<Option<Content>> {
        Ok(self.items.lock().unwrap().iter().find(|c| c.id() == id).cloned())
    }

    async fn is_path_published(&self, content: &Content) -> IndexResult<bool> {
        let items = self.items.lock().unwrap();
        let published: HashSet<i32> = items.iter().filter(|c| c.published).map(|c| c.id()).collect();
        Ok(content.published
            && content
                .entity
                .ancestor_ids()
                .iter()
                .all(|id| published.contains(id)))
    }

    async fn get_paged_of_types(
        &self,
        content_type_ids: &[i32],
        page_index: u64,
        page_size: u64,
        ordering: Ordering,
    ) -> IndexResult<Page<Content>> {
        let mut items: Vec<Content> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|c| content_type_ids.contains(&c.content_type.id))
            .cloned()
            .collect();
        if ordering == Ordering::PathAscending {
            items.sort_by(|a, b| by_path(&a.entity, &b.entity));
        }
        Ok(page(items, page_index, page_size))
    }
}

#[derive(Default)]
pub struct FakeMediaService {
    items: Mutex<Vec<Media>>,
}

impl FakeMediaService {
    pub fn new(items: Vec<Media>) -> Self {
        Self {
            items: Mutex::new(items),
        }
    }

    pub fn upsert(&self, item: Media) {
        let mut items = self.items.lock().unwrap();
        items.retain(|m| m.id() != item.id());
        items.push(item);
    }
}

#[async_trait]
impl MediaService for FakeMediaService {
    async fn get_paged_descendants(
        &self,
        parent_id: i32,
        page_index: u64,
        page_size: u64,
    ) -> IndexResult<Page<Media>> {
        let mut items: Vec<Media> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|m| in_branch(&m.entity, parent_id))
            .cloned()
            .collect();
        items.sort_by(|a, b| by_path(&a.entity, &b.entity));
        Ok(page(items, page_index, page_size))
    }

    async fn get_by_id(&self, id: i32) -> IndexResult<Option<Media>> {
        Ok(self.items.lock().unwrap().iter().find(|m| m.id() == id).cloned())
    }

    async fn get_paged_of_types(
        &self,
        media_type_ids: &[i32],
        page_index: u64,
        page_size: u64,
    ) -> IndexResult<Page<Media>> {
        let items: Vec<Media> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|m| media_type_ids.contains(&m.media_type.id))
            .cloned()
            .collect();
        Ok(page(items, page_index, page_size))
    }
}

#[derive(Default)]
pub struct FakeMemberService {
    items: Mutex<Vec<Member>>,
}

impl FakeMemberService {
    pub fn new(items: Vec<Member>) -> Self {
        Self {
            items: Mutex::new(items),
        }
    }
}

#[async_trait]
impl MemberService for FakeMemberService {
    async fn get_all(
        &self,
        page_index: u64,
        page_size: u64,
        member_type_alias: Option<&str>,
    ) -> IndexResult<Page<Member>> {
        let mut items: Vec<Member> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|m| member_type_alias.is_none_or(|a| m.member_type.alias.eq_ignore_ascii_case(a)))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.login_name.cmp(&b.login_name));
        Ok(page(items, page_index, page_size))
    }

    async fn get_by_id(&self, id: i32) -> IndexResult<Option<Member>> {
        Ok(self.items.lock().unwrap().iter().find(|m| m.id() == id).cloned())
    }

    async fn member_type_aliases(&self, member_type_ids: &[i32]) -> IndexResult<Vec<String>> {
        let mut aliases: Vec<String> = self
            .items
            .lock()
            .unwrap()
            .iter()
            .filter(|m| member_type_ids.contains(&m.member_type.id))
            .map(|m| m.member_type.alias.clone())
            .collect();
        aliases.sort();
        aliases.dedup();
        Ok(aliases)
    }
}

#[derive(Default)]
pub struct FakeUserService {
    profiles: HashMap<i32, UserProfile>,
    pub lookups: AtomicUsize,
}

impl FakeUserService {
    pub fn new(profiles: &[(i32, &str)]) -> Self {
        Self {
            profiles: profiles
                .iter()
                .map(|(id, name)| {
                    (
                        *id,
                        UserProfile {
                            id: *id,
                            name: name.to_string(),
                        },
                    )
                })
                .collect(),
            lookups: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl UserService for FakeUserService {
    async fn get_profiles_by_id(&self, ids: &[i32]) -> IndexResult<HashMap<i32, UserProfile>> {
        self.lookups.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(ids
            .iter()
            .filter_map(|id| self.profiles.get(id).map(|p| (*id, p.clone())))
            .collect())
    }
}

/// Nodes in `protected` protect themselves and everything below them.
#[derive(Default)]
pub struct FakePublicAccess {
    protected: Mutex<HashSet<i32>>,
}

impl FakePublicAccess {
    pub fn protect(&self, id: i32) {
        self.protected.lock().unwrap().insert(id);
    }
}

impl PublicAccessService for FakePublicAccess {
    fn is_protected(&self, path: &str) -> bool {
        let protected = self.protected.lock().unwrap();
        path.split(',')
            .filter_map(|s| s.trim().parse::<i32>().ok())
            .any(|id| protected.contains(&id))
    }
}

#[derive(Clone, Default)]
pub struct TestServices {
    pub content: Arc<FakeContentService>,
    pub media: Arc<FakeMediaService>,
    pub members: Arc<FakeMemberService>,
    pub users: Arc<FakeUserService>,
    pub public_access: Arc<FakePublicAccess>,
}

impl TestServices {
    pub fn with_content(items: Vec<Content>) -> Self {
        Self {
            content: Arc::new(FakeContentService::new(items)),
            ..Default::default()
        }
    }

    pub fn context(&self) -> ServiceContext {
        ServiceContext {
            content: self.content.clone(),
            media: self.media.clone(),
            members: self.members.clone(),
            users: self.users.clone(),
            public_access: self.public_access.clone(),
        }
    }
}

// ============================================================================
// Fully wired engine
// ============================================================================

pub struct TestEnv {
    pub dir: TempDir,
    pub settings: IndexingSettings,
    pub services: TestServices,
    pub tasks: Arc<TokioTaskQueue>,
    pub main_dom: Arc<MainDomFlag>,
    pub runtime: Arc<RuntimeLevelState>,
    pub status: Arc<IndexRebuildStatusManager>,
    pub rebuilder: IndexRebuilder,
    pub handler: IndexingHandler,
}

impl TestEnv {
    /// Internal, external and members indexes under a temp dir, no startup delay.
    pub async fn new(services: TestServices) -> IndexResult<Self> {
        Self::with_indexes(
            services,
            vec![
                IndexDefinition::internal(),
                IndexDefinition::external(),
                IndexDefinition::members(),
            ],
        )
        .await
    }

    pub async fn with_indexes(services: TestServices, indexes: Vec<IndexDefinition>) -> IndexResult<Self> {
        init_tracing();
        let dir = TempDir::new()?;
        let settings = IndexingSettings {
            index_root: dir.path().to_path_buf(),
            rebuild_on_startup_delay_ms: 0,
            indexes,
        };

        let context = services.context();
        let registry = IndexRegistry::from_settings(
            &settings,
            context.public_access.clone(),
            Arc::new(DefaultScopeProvider),
        )
        .await?;

        let editors = Arc::new(PropertyEditorCollection::with_defaults());
        let handlers = Arc::new(ContentIndexHandlerCollection::with_defaults());
        let populators = default_populators(&settings, &context, Arc::clone(&editors), handlers);

        let tasks = Arc::new(TokioTaskQueue::new());
        let main_dom = Arc::new(MainDomFlag::new(true));
        let runtime = Arc::new(RuntimeLevelState::new(RuntimeLevel::Run));
        let status = Arc::new(IndexRebuildStatusManager::new());

        let rebuilder = IndexRebuilder::new(
            registry,
            populators,
            main_dom.clone(),
            runtime.clone(),
            tasks.clone(),
            status.clone(),
        );
        let handler = IndexingHandler::new(
            context,
            editors,
            tasks.clone(),
            main_dom.clone(),
            rebuilder.clone(),
            Duration::ZERO,
        );

        Ok(Self {
            dir,
            settings,
            services,
            tasks,
            main_dom,
            runtime,
            status,
            rebuilder,
            handler,
        })
    }

    pub fn index(&self, name: &str) -> Arc<dyn SearchIndex> {
        self.rebuilder
            .registry()
            .get(name)
            .unwrap_or_else(|| panic!("index {name} not registered"))
    }

    pub async fn settle(&self) {
        self.tasks.wait_idle().await;
    }
}

/// Ids of every document in the index, sorted.
pub async fn indexed_ids(index: &dyn SearchIndex) -> Vec<String> {
    let results = index
        .search(
            &cms_index::search::IndexQuery::All,
            &cms_index::search::SearchOptions::new(0, 10_000),
        )
        .await
        .unwrap();
    let mut ids: Vec<String> = results.ids().map(str::to_string).collect();
    ids.sort();
    ids
}
