use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use treesync_core::model::{ContentItem, ContentType, PropertyType, Template};
use treesync_core::store::{EntityStore, MemoryStore};
use treesync_core::{EntityKind, HandlerSettings};
use treesync_core_types::RequestContext;
use treesync_engine::commands::check::DriftReport;
use treesync_engine::commands::export::ExportReport;
use treesync_engine::commands::sync::SyncReport;
use treesync_engine::{apply_engine_command, EngineCommand, EngineCommandResult, SyncContext};
use treesync_store::{FsViewResolver, HandlerConfig, SyncSettings, WithViewFolder};
use uuid::Uuid;

pub type TestStore = WithViewFolder<MemoryStore>;

#[allow(dead_code)]
pub fn key(n: u128) -> Uuid {
    Uuid::from_u128(0x5000_0000_0000_0000_0000_0000_0000_0000 + n)
}

/// A temp directory holding the document root and a view folder
#[allow(dead_code)]
pub struct Workspace {
    pub dir: TempDir,
    pub settings: SyncSettings,
}

#[allow(dead_code)]
impl Workspace {
    pub fn new(views: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        let view_dir = dir.path().join("views");
        fs::create_dir_all(&view_dir).unwrap();
        for alias in views {
            fs::write(view_dir.join(format!("{}.cshtml", alias)), format!("@* {} *@", alias)).unwrap();
        }
        let mut settings = SyncSettings::new(dir.path().join("site"));
        settings.views = Some(view_dir);
        Self { dir, settings }
    }

    pub fn root(&self) -> PathBuf {
        self.settings.root.clone()
    }

    pub fn configure(&mut self, kind: EntityKind, settings: HandlerSettings) {
        self.settings = self.settings.clone().with_handler(
            kind,
            HandlerConfig {
                enabled: true,
                settings,
            },
        );
    }

    /// A fresh empty store reading views from this workspace
    pub fn store(&self) -> TestStore {
        let views = self.settings.views.clone().unwrap();
        WithViewFolder::new(MemoryStore::new(), FsViewResolver::new(views))
    }

    pub fn context(&self, store: &TestStore) -> SyncContext<TestStore> {
        SyncContext::new(store.clone(), &self.settings)
    }

    /// File stems in one kind folder, sorted
    pub fn files(&self, kind: EntityKind) -> Vec<String> {
        let dir = self.root().join(kind.folder_name());
        let mut names: Vec<String> = match fs::read_dir(&dir) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }
}

/// Two templates, one content type and a two-level content tree
#[allow(dead_code)]
pub fn seed_site(store: &MemoryStore) {
    let mut master = Template::new(key(1), "master", "Master");
    store.save(&mut master).unwrap();
    let mut page_view = Template::new(key(2), "page", "Page");
    page_view.master_alias = Some("master".to_string());
    store.save(&mut page_view).unwrap();

    let mut page = ContentType::new(key(10), "page", "Page");
    let mut title = PropertyType::new("title", "Title", "textbox");
    title.key = key(11);
    page.properties.push(title);
    store.save(&mut page).unwrap();

    let mut home = ContentItem::new(key(20), "Home", "page");
    home.template_alias = Some("page".to_string());
    home.published = true;
    home.values.insert("title".to_string(), Value::from("Welcome"));
    store.save(&mut home).unwrap();

    let mut about = ContentItem::new(key(21), "About", "page");
    about.parent_key = Some(key(20));
    about.sort_order = 1;
    about.values.insert("title".to_string(), Value::from("About us"));
    store.save(&mut about).unwrap();
}

#[allow(dead_code)]
pub fn run(ctx: &mut SyncContext<TestStore>, cmd: EngineCommand) -> EngineCommandResult {
    apply_engine_command(cmd, ctx, &RequestContext::new()).unwrap()
}

#[allow(dead_code)]
pub fn export(ctx: &mut SyncContext<TestStore>) -> ExportReport {
    match run(ctx, EngineCommand::Export) {
        EngineCommandResult::Export(report) => report,
        other => panic!("unexpected result {:?}", other),
    }
}

#[allow(dead_code)]
pub fn import(ctx: &mut SyncContext<TestStore>) -> SyncReport {
    match run(ctx, EngineCommand::Import { cancel: None }) {
        EngineCommandResult::Import(report) => report,
        other => panic!("unexpected result {:?}", other),
    }
}

#[allow(dead_code)]
pub fn report(ctx: &mut SyncContext<TestStore>) -> SyncReport {
    match run(ctx, EngineCommand::Report { cancel: None }) {
        EngineCommandResult::Report(report) => report,
        other => panic!("unexpected result {:?}", other),
    }
}

#[allow(dead_code)]
pub fn check(ctx: &mut SyncContext<TestStore>) -> DriftReport {
    match run(ctx, EngineCommand::Check) {
        EngineCommandResult::Check(report) => report,
        other => panic!("unexpected result {:?}", other),
    }
}
