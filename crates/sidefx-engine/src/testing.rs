//! In-memory doubles for the UI collaborators and a small order page fixture.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use sidefx_types::{ErrorKind, RequestError, Schema, Target};

use crate::config::SideEffectsConfig;
use crate::context::{BindableField, BindingContext, MetaModel, PageView};
use crate::scheduler::EffectScheduler;
use crate::service::SideEffectsService;

/// Meta paths are data paths with key predicates removed.
#[derive(Debug, Default)]
pub(crate) struct MockMetaModel {
    types: HashMap<String, String>,
    lookups: AtomicUsize,
}

impl MockMetaModel {
    pub(crate) fn new(types: Vec<(String, String)>) -> Self {
        Self {
            types: types.into_iter().collect(),
            lookups: AtomicUsize::new(0),
        }
    }

    pub(crate) fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub(crate) fn reset_lookups(&self) {
        self.lookups.store(0, Ordering::SeqCst);
    }
}

impl MetaModel for MockMetaModel {
    fn meta_path(&self, binding_path: &str) -> String {
        binding_path
            .split('/')
            .map(|segment| segment.split_once('(').map_or(segment, |(name, _)| name))
            .collect::<Vec<_>>()
            .join("/")
    }

    fn entity_type(&self, meta_path: &str) -> Option<String> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.types.get(meta_path).cloned()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct RecordedRequest {
    pub path: String,
    pub targets: Vec<Target>,
    pub group_id: Option<String>,
}

/// Everything the mock contexts were asked to do, shared by one page.
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    requests: Mutex<Vec<RecordedRequest>>,
    actions: Mutex<Vec<(String, String)>>,
    events: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
    failing_actions: Mutex<HashSet<String>>,
}

impl Recorder {
    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// `(action, context path)` pairs in call order.
    pub(crate) fn actions(&self) -> Vec<(String, String)> {
        self.actions.lock().clone()
    }

    /// `action:<name>` and `request:<path>` in the order they were issued.
    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub(crate) fn clear(&self) {
        self.requests.lock().clear();
        self.actions.lock().clear();
        self.events.lock().clear();
    }

    pub(crate) fn set_failing(&self, path: &str, failing: bool) {
        let mut paths = self.failing.lock();
        if failing {
            paths.insert(path.to_string());
        } else {
            paths.remove(path);
        }
    }

    pub(crate) fn fail_action(&self, action: &str) {
        self.failing_actions.lock().insert(action.to_string());
    }
}

#[derive(Debug)]
pub(crate) struct MockContext {
    path: String,
    parent: Option<Arc<dyn BindingContext>>,
    meta: Arc<MockMetaModel>,
    recorder: Arc<Recorder>,
}

impl MockContext {
    pub(crate) fn new(
        path: &str,
        parent: Option<Arc<dyn BindingContext>>,
        meta: &Arc<MockMetaModel>,
        recorder: &Arc<Recorder>,
    ) -> Arc<dyn BindingContext> {
        Arc::new(Self {
            path: path.to_string(),
            parent,
            meta: Arc::clone(meta),
            recorder: Arc::clone(recorder),
        })
    }
}

#[async_trait]
impl BindingContext for MockContext {
    fn path(&self) -> String {
        self.path.clone()
    }

    fn parent_context(&self) -> Option<Arc<dyn BindingContext>> {
        self.parent.clone()
    }

    fn meta_model(&self) -> Arc<dyn MetaModel> {
        self.meta.clone()
    }

    async fn request_side_effects(
        &self,
        targets: &[Target],
        group_id: Option<&str>,
    ) -> Result<(), RequestError> {
        self.recorder
            .events
            .lock()
            .push(format!("request:{}", self.path));
        self.recorder.requests.lock().push(RecordedRequest {
            path: self.path.clone(),
            targets: targets.to_vec(),
            group_id: group_id.map(str::to_string),
        });
        tokio::task::yield_now().await;

        if self.recorder.failing.lock().contains(&self.path) {
            return Err(RequestError::new(ErrorKind::Backend, "request rejected")
                .with_detail(self.path.clone()));
        }
        Ok(())
    }

    async fn execute_action(
        &self,
        action: &str,
        _group_id: Option<&str>,
    ) -> Result<(), RequestError> {
        self.recorder.events.lock().push(format!("action:{action}"));
        self.recorder
            .actions
            .lock()
            .push((action.to_string(), self.path.clone()));
        tokio::task::yield_now().await;

        if self.recorder.failing_actions.lock().contains(action) {
            return Err(RequestError::new(ErrorKind::ActionFailed, action));
        }
        Ok(())
    }
}

pub(crate) struct MockField {
    pub id: String,
    pub groups: Vec<String>,
    pub context: Option<Arc<dyn BindingContext>>,
    pub source_path: Option<String>,
}

impl MockField {
    pub(crate) fn new(
        id: &str,
        groups: &[&str],
        context: &Arc<dyn BindingContext>,
        source_path: Option<&str>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            groups: groups.iter().map(|g| g.to_string()).collect(),
            context: Some(Arc::clone(context)),
            source_path: source_path.map(str::to_string),
        })
    }
}

impl BindableField for MockField {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn field_group_ids(&self) -> Vec<String> {
        self.groups.clone()
    }

    fn binding_context(&self) -> Option<Arc<dyn BindingContext>> {
        self.context.clone()
    }

    fn source_path(&self) -> Option<String> {
        self.source_path.clone()
    }
}

pub(crate) struct MockView {
    pub entity_set: Option<String>,
    pub context: Option<Arc<dyn BindingContext>>,
}

impl PageView for MockView {
    fn entity_set(&self) -> Option<String> {
        self.entity_set.clone()
    }

    fn binding_context(&self) -> Option<Arc<dyn BindingContext>> {
        self.context.clone()
    }
}

pub(crate) const ORDER: &str = "com.sap.Order";
pub(crate) const ITEM: &str = "com.sap.Item";

pub(crate) const CUSTOMER_GROUP: &str = "$$ImmediateRequestcom.sap.Order#Customer";
pub(crate) const HEADER_GROUP: &str = "com.sap.Order#Header";

/// Order with items. Rules on `com.sap.Order`:
/// - `#Customer`: customerId -> customerName
/// - `#Header`: total -> status
/// - `#Items`: _Items/quantity -> total, entity _Items
/// - `#Save`: global, status with trigger `com.sap.Recompute`
///
/// Bound action `com.sap.Approve` re-reads `status` and triggers `com.sap.Notify`.
pub(crate) fn order_schema() -> Arc<Schema> {
    let json = r#"{
        "entityTypes": [
            {
                "fullyQualifiedName": "com.sap.Order",
                "entityProperties": [
                    { "name": "id", "type": "Edm.String" },
                    { "name": "customerId", "type": "Edm.String" },
                    { "name": "customerName", "type": "Edm.String" },
                    { "name": "total", "type": "Edm.Decimal" },
                    { "name": "status", "type": "Edm.String" }
                ],
                "navigationProperties": [
                    { "name": "_Items", "targetType": "com.sap.Item", "isCollection": true }
                ],
                "actions": [
                    {
                        "fullyQualifiedName": "com.sap.Approve(com.sap.Order)",
                        "isBound": true,
                        "parameters": [{ "fullyQualifiedName": "com.sap.Approve(com.sap.Order)/_it" }],
                        "annotations": [
                            {
                                "term": "com.sap.vocabularies.Common.v1.SideEffects",
                                "record": {
                                    "$Type": "com.sap.vocabularies.Common.v1.SideEffectsType",
                                    "TargetProperties": ["_it/status"],
                                    "TriggerAction": "com.sap.Notify"
                                }
                            }
                        ]
                    }
                ],
                "annotations": [
                    {
                        "term": "com.sap.vocabularies.Common.v1.SideEffects",
                        "qualifier": "Customer",
                        "record": {
                            "$Type": "com.sap.vocabularies.Common.v1.SideEffectsType",
                            "SourceProperties": [{ "type": "PropertyPath", "value": "customerId" }],
                            "TargetProperties": ["customerName"]
                        }
                    },
                    {
                        "term": "com.sap.vocabularies.Common.v1.SideEffects",
                        "qualifier": "Header",
                        "record": {
                            "$Type": "com.sap.vocabularies.Common.v1.SideEffectsType",
                            "SourceProperties": [{ "type": "PropertyPath", "value": "total" }],
                            "TargetProperties": ["status"]
                        }
                    },
                    {
                        "term": "com.sap.vocabularies.Common.v1.SideEffects",
                        "qualifier": "Items",
                        "record": {
                            "$Type": "com.sap.vocabularies.Common.v1.SideEffectsType",
                            "SourceProperties": [{ "type": "PropertyPath", "value": "_Items/quantity" }],
                            "TargetProperties": ["total"],
                            "TargetEntities": [{ "type": "NavigationPropertyPath", "value": "_Items" }]
                        }
                    },
                    {
                        "term": "com.sap.vocabularies.Common.v1.SideEffects",
                        "qualifier": "Save",
                        "record": {
                            "$Type": "com.sap.vocabularies.Common.v1.SideEffectsType",
                            "TargetProperties": ["status"],
                            "TriggerAction": "com.sap.Recompute"
                        }
                    }
                ]
            },
            {
                "fullyQualifiedName": "com.sap.Item",
                "entityProperties": [
                    { "name": "quantity", "type": "Edm.Int32" },
                    { "name": "price", "type": "Edm.Decimal" }
                ]
            }
        ]
    }"#;
    Arc::new(serde_json::from_str(json).unwrap())
}

/// An initialized service, a view bound to `/Orders('1')` and one of its items.
pub(crate) struct Page {
    pub recorder: Arc<Recorder>,
    pub order: Arc<dyn BindingContext>,
    pub item: Arc<dyn BindingContext>,
    pub view: Arc<MockView>,
    pub service: Arc<SideEffectsService>,
    pub scheduler: EffectScheduler,
}

impl Page {
    pub(crate) fn new() -> Self {
        let meta = Arc::new(MockMetaModel::new(vec![
            ("/Orders".to_string(), ORDER.to_string()),
            ("/Orders/_Items".to_string(), ITEM.to_string()),
        ]));
        let recorder = Arc::new(Recorder::default());
        let order = MockContext::new("/Orders('1')", None, &meta, &recorder);
        let item = MockContext::new(
            "/Orders('1')/_Items('10')",
            Some(Arc::clone(&order)),
            &meta,
            &recorder,
        );
        let view = Arc::new(MockView {
            entity_set: Some("Orders".to_string()),
            context: Some(Arc::clone(&order)),
        });

        let service = Arc::new(SideEffectsService::new());
        service.initialize(order_schema());
        let scheduler = EffectScheduler::new(
            Arc::clone(&service),
            view.clone(),
            SideEffectsConfig::default(),
        );

        Self {
            recorder,
            order,
            item,
            view,
            service,
            scheduler,
        }
    }

    pub(crate) fn field(
        &self,
        id: &str,
        groups: &[&str],
        context: &Arc<dyn BindingContext>,
        source_path: Option<&str>,
    ) -> Arc<MockField> {
        MockField::new(id, groups, context, source_path)
    }
}
