use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use quiz_core::model::{QuizKind, SessionResult, SkillProgressCounter, UsedQuestionPool};
use quiz_core::time::fixed_clock;
use services::{AppServices, QuizConfig, StaticFetcher};
use storage::{InMemoryStore, Storage};
use tokio::sync::oneshot;
use tokio::task::LocalSet;

use crate::dom::NodeId;
use crate::lifecycle::{Cleanup, ConfirmExit, FixedConfirm, QuizModule, WidgetOptions};
use crate::markup::mount_quiz_markup;
use crate::page::Page;
use crate::scope::resolve;

/// Yields that let every chain of ready local tasks run to a stop.
const SETTLE_ROUNDS: usize = 64;

/// Widget tests run under `#[tokio::test(start_paused = true)]`, so time
/// only moves through [`Harness::advance`].
pub(crate) struct Harness {
    local: LocalSet,
    pub page: Rc<Page>,
    pub fetcher: StaticFetcher,
    pub services: AppServices,
}

impl Harness {
    pub fn new() -> Self {
        let page = Page::new();
        let fetcher = StaticFetcher::new();
        let storage = Storage {
            kv: Arc::new(InMemoryStore::new()),
        };
        let config = QuizConfig {
            data_base_url: "mem://quiz".into(),
            ..QuizConfig::default()
        };
        let services =
            AppServices::from_parts(&storage, Arc::new(fetcher.clone()), &config, fixed_clock());
        let seeded = services.loader().clone().with_seed(5);
        Self {
            local: LocalSet::new(),
            page,
            fetcher,
            services: services.with_loader(seeded),
        }
    }

    pub fn serve(&self, kind: QuizKind, body: impl Into<String>) {
        self.fetcher.respond(self.services.loader().url_for(kind), body);
    }

    /// A fresh root carrying the standard markup.
    pub fn add_root(&self) -> NodeId {
        let mut doc = self.page.document_mut();
        let body = doc.body();
        let root = doc.append_new(body, "section", None).unwrap();
        mount_quiz_markup(&mut doc, root).unwrap();
        root
    }

    pub fn module(&self, kind: QuizKind, confirm: Rc<dyn ConfirmExit>) -> QuizModule {
        QuizModule::new(kind, self.services.clone(), confirm)
    }

    /// Run `action` where it can spawn onto the harness's task set, without
    /// letting the spawned tasks run yet.
    pub fn enter<R>(&self, action: impl FnOnce() -> R) -> R {
        let _guard = self.local.enter();
        action()
    }

    /// Start a mount and return before its first load completes.
    pub fn init(
        &self,
        module: &QuizModule,
        root: Option<NodeId>,
        options: WidgetOptions,
    ) -> Cleanup {
        self.enter(|| module.init(&self.page, root, options))
    }

    pub async fn mount(&self, kind: QuizKind, root: NodeId) -> Cleanup {
        self.mount_with(kind, root, Rc::new(FixedConfirm(true)), WidgetOptions::default())
            .await
    }

    pub async fn mount_with(
        &self,
        kind: QuizKind,
        root: NodeId,
        confirm: Rc<dyn ConfirmExit>,
        options: WidgetOptions,
    ) -> Cleanup {
        let module = self.module(kind, confirm);
        let cleanup = self.init(&module, Some(root), options);
        self.settle().await;
        cleanup
    }

    /// Run spawned tasks until none can make progress.
    pub async fn settle(&self) {
        self.local
            .run_until(async {
                for _ in 0..SETTLE_ROUNDS {
                    tokio::task::yield_now().await;
                }
            })
            .await;
    }

    /// Move the paused tokio clock forward and run whatever fell due.
    pub async fn advance(&self, ms: u64) {
        tokio::time::advance(Duration::from_millis(ms)).await;
        self.settle().await;
    }

    pub fn node(&self, root: NodeId, id: &str) -> NodeId {
        resolve(&self.page.document(), root, id).unwrap_or_else(|| panic!("missing #{id}"))
    }

    pub async fn click(&self, root: NodeId, id: &str) {
        let node = self.node(root, id);
        self.enter(|| self.page.click(node));
        self.settle().await;
    }

    pub async fn type_text(&self, root: NodeId, id: &str, value: &str) {
        let node = self.node(root, id);
        self.enter(|| self.page.input(node, value));
        self.settle().await;
    }

    pub async fn key(&self, target: NodeId, key: &str) {
        self.enter(|| self.page.key_down(target, key));
        self.settle().await;
    }

    pub fn text(&self, root: NodeId, id: &str) -> String {
        let node = self.node(root, id);
        self.page.document().text(node).unwrap_or_default().to_owned()
    }

    pub fn visible(&self, root: NodeId, id: &str) -> bool {
        let node = self.node(root, id);
        self.page.document().is_visible(node)
    }

    pub async fn progress(&self, kind: QuizKind) -> SkillProgressCounter {
        self.services
            .progress()
            .get_progress(&kind.skill(), kind.profile().stage_budget)
            .await
    }

    pub async fn sessions(&self, kind: QuizKind) -> Vec<SessionResult> {
        self.services.progress().get_sessions(&kind.skill()).await
    }

    pub async fn used_pool(&self, kind: QuizKind) -> UsedQuestionPool {
        self.services.progress().used_pool(kind).await
    }
}

/// Confirmation the test answers later.
pub(crate) struct PendingConfirm {
    receiver: RefCell<Option<oneshot::Receiver<bool>>>,
}

impl PendingConfirm {
    pub fn new() -> (Rc<Self>, oneshot::Sender<bool>) {
        let (sender, receiver) = oneshot::channel();
        let confirm = Rc::new(Self {
            receiver: RefCell::new(Some(receiver)),
        });
        (confirm, sender)
    }
}

#[async_trait(?Send)]
impl ConfirmExit for PendingConfirm {
    async fn confirm_exit(&self) -> bool {
        let receiver = self.receiver.borrow_mut().take();
        match receiver {
            Some(receiver) => receiver.await.unwrap_or(false),
            None => false,
        }
    }
}

pub(crate) fn word_payload(count: usize) -> String {
    let questions: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            serde_json::json!({
                "id": format!("w{i}"),
                "type": "word",
                "word": format!("word{i}"),
                "is_real": true
            })
        })
        .collect();
    serde_json::json!({ "questions": questions }).to_string()
}

pub(crate) fn writing_payload() -> String {
    serde_json::json!({
        "questions": [{
            "id": "photo-1",
            "type": "writing",
            "prompt": "Describe the photo",
            "image_url": "https://example.com/dog.jpg",
            "sample": "A brown dog runs across the green park"
        }]
    })
    .to_string()
}
