//! Shared fixtures for scheduler tests.

use crate::error::{ManagerError, ScheduleError};
use crate::manager::MetricManager;
use crate::schedule::{Schedule, ScheduleResponse, ScheduleState};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use pulse_core::plugin::content_type;
use pulse_core::{
    ConfigDataNode, Metric, Payload, PluginKey, PluginType, RequestedMetric, SubscribedPlugin,
    TaskId,
};
use pulse_workflow::{
    CatalogError, ContentTypeCatalog, ContentTypes, Pipeline, ProcessNode, PublishNode,
    WorkflowMap, compile,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Default)]
struct MockState {
    calls: Vec<String>,
    unmarshal_count: usize,
    failing_plugins: HashSet<String>,
    fail_collect: bool,
    fail_validating_metrics: bool,
    collect_delay: Duration,
    collects_in_flight: usize,
    max_collects_in_flight: usize,
    subscribed: HashSet<TaskId>,
    unsubscribe_count: usize,
}

/// A metric manager with a fixed content-type catalog.
pub(crate) struct MockManager {
    content_types: HashMap<String, ContentTypes>,
    state: Mutex<MockState>,
}

fn catalog_key(name: &str, plugin_type: PluginType, version: i32) -> String {
    format!("{name}:{plugin_type}:{version}")
}

impl MockManager {
    pub(crate) fn new() -> Self {
        let mut manager = Self {
            content_types: HashMap::new(),
            state: Mutex::new(MockState::default()),
        };
        manager.set_content_types(
            "machine",
            PluginType::Processor,
            1,
            ContentTypes::new(["pulse.*", "pulse.gob", "foo.bar"], ["pulse.gob"]),
        );
        manager.set_content_types(
            "rmq",
            PluginType::Publisher,
            -1,
            ContentTypes::new(["pulse.json", "pulse.gob"], Vec::<String>::new()),
        );
        manager.set_content_types(
            "file",
            PluginType::Publisher,
            -1,
            ContentTypes::new(["pulse.json"], Vec::<String>::new()),
        );
        manager
    }

    pub(crate) fn set_content_types(
        &mut self,
        name: &str,
        plugin_type: PluginType,
        version: i32,
        types: ContentTypes,
    ) {
        self.content_types
            .insert(catalog_key(name, plugin_type, version), types);
    }

    pub(crate) fn fail_plugin(&self, name: &str) {
        self.state.lock().failing_plugins.insert(name.to_string());
    }

    pub(crate) fn fail_collect(&self) {
        self.state.lock().fail_collect = true;
    }

    pub(crate) fn recover(&self) {
        let mut state = self.state.lock();
        state.fail_collect = false;
        state.failing_plugins.clear();
    }

    pub(crate) fn fail_validating_metrics(&self) {
        self.state.lock().fail_validating_metrics = true;
    }

    pub(crate) fn set_collect_delay(&self, delay: Duration) {
        self.state.lock().collect_delay = delay;
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    pub(crate) fn collect_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| *call == "collect")
            .count()
    }

    /// Highest number of collect calls that overlapped.
    pub(crate) fn max_collects_in_flight(&self) -> usize {
        self.state.lock().max_collects_in_flight
    }

    pub(crate) fn unmarshal_count(&self) -> usize {
        self.state.lock().unmarshal_count
    }

    pub(crate) fn is_subscribed(&self, task_id: TaskId) -> bool {
        self.state.lock().subscribed.contains(&task_id)
    }

    pub(crate) fn unsubscribe_count(&self) -> usize {
        self.state.lock().unsubscribe_count
    }

    fn record(&self, call: String) {
        self.state.lock().calls.push(call);
    }

    fn is_failing(&self, plugin: &PluginKey) -> bool {
        self.state.lock().failing_plugins.contains(&plugin.name)
    }
}

impl ContentTypeCatalog for MockManager {
    fn plugin_content_types(&self, plugin: &PluginKey) -> Result<ContentTypes, CatalogError> {
        self.content_types
            .get(&catalog_key(&plugin.name, plugin.plugin_type, plugin.version))
            .cloned()
            .ok_or_else(|| CatalogError::PluginNotFound {
                plugin: plugin.clone(),
            })
    }
}

#[async_trait]
impl MetricManager for MockManager {
    fn validate_deps(
        &self,
        metrics: &[RequestedMetric],
        plugins: &[SubscribedPlugin],
    ) -> Vec<ManagerError> {
        let mut errors = Vec::new();
        if self.state.lock().fail_validating_metrics {
            errors.extend(metrics.iter().map(|metric| ManagerError::MetricNotFound {
                namespace: metric.namespace.to_string(),
                version: metric.version,
            }));
        }
        errors.extend(
            plugins
                .iter()
                .filter(|plugin| self.plugin_content_types(&plugin.key).is_err())
                .map(|plugin| ManagerError::PluginNotFound {
                    plugin: plugin.key.clone(),
                }),
        );
        errors
    }

    fn subscribe_deps(
        &self,
        task_id: TaskId,
        _metrics: &[RequestedMetric],
        _plugins: &[SubscribedPlugin],
    ) -> Vec<ManagerError> {
        self.state.lock().subscribed.insert(task_id);
        Vec::new()
    }

    fn unsubscribe_deps(
        &self,
        task_id: TaskId,
        _metrics: &[RequestedMetric],
        _plugins: &[SubscribedPlugin],
    ) -> Vec<ManagerError> {
        let mut state = self.state.lock();
        state.subscribed.remove(&task_id);
        state.unsubscribe_count += 1;
        Vec::new()
    }

    async fn collect_metrics(
        &self,
        metrics: &[RequestedMetric],
        _deadline: DateTime<Utc>,
    ) -> Result<Vec<Metric>, Vec<ManagerError>> {
        self.record("collect".to_string());
        let (delay, fail) = {
            let mut state = self.state.lock();
            state.collects_in_flight += 1;
            state.max_collects_in_flight =
                state.max_collects_in_flight.max(state.collects_in_flight);
            (state.collect_delay, state.fail_collect)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.state.lock().collects_in_flight -= 1;
        if fail {
            return Err(vec![ManagerError::CollectFailed {
                reason: "collector unavailable".to_string(),
            }]);
        }
        Ok(metrics
            .iter()
            .map(|m| Metric::new(m.namespace.clone(), m.version, serde_json::json!(1)))
            .collect())
    }

    fn marshal_metrics(
        &self,
        content_type: &str,
        metrics: &[Metric],
    ) -> Result<Payload, ManagerError> {
        if content_type != content_type::PULSE_GOB && content_type != content_type::PULSE_JSON {
            return Err(ManagerError::Encoding {
                content_type: content_type.to_string(),
                reason: "not a native content type".to_string(),
            });
        }
        let data = serde_json::to_vec(metrics).map_err(|e| ManagerError::Encoding {
            content_type: content_type.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Payload::new(content_type, data))
    }

    fn unmarshal_metrics(&self, payload: &Payload) -> Result<Vec<Metric>, ManagerError> {
        self.state.lock().unmarshal_count += 1;
        if !self.native_content_types().contains(&payload.content_type) {
            return Err(ManagerError::Encoding {
                content_type: payload.content_type.clone(),
                reason: "not a native content type".to_string(),
            });
        }
        serde_json::from_slice(&payload.data).map_err(|e| ManagerError::Encoding {
            content_type: payload.content_type.clone(),
            reason: e.to_string(),
        })
    }

    async fn process_metrics(
        &self,
        payload: &Payload,
        plugin: &PluginKey,
        _config: &ConfigDataNode,
    ) -> Result<Payload, Vec<ManagerError>> {
        self.record(format!("process {plugin} {}", payload.content_type));
        if self.is_failing(plugin) {
            return Err(vec![ManagerError::ProcessFailed {
                plugin: plugin.clone(),
                reason: "processor crashed".to_string(),
            }]);
        }
        let content_type = self
            .plugin_content_types(plugin)
            .ok()
            .and_then(|types| types.returned.first().cloned())
            .unwrap_or_else(|| payload.content_type.clone());
        Ok(Payload::new(content_type, payload.data.clone()))
    }

    async fn publish_metrics(
        &self,
        payload: &Payload,
        plugin: &PluginKey,
        _config: &ConfigDataNode,
    ) -> Result<(), Vec<ManagerError>> {
        self.record(format!("publish {plugin} {}", payload.content_type));
        if self.is_failing(plugin) {
            return Err(vec![ManagerError::PublishFailed {
                plugin: plugin.clone(),
                reason: "publisher crashed".to_string(),
            }]);
        }
        Ok(())
    }
}

/// collect -> machine -> machine -> file, collect -> rmq
pub(crate) fn sample_map() -> WorkflowMap {
    let mut map = WorkflowMap::new();
    let collect = map.collect_node_mut();
    collect.add_metric("/foo/bar", 1);
    collect.add_metric("/foo/baz", 2);
    collect.add_config_item("/foo/bar", "username", "root");
    collect.add_config_item("/foo/bar", "port", 8080);
    collect.add_config_item("/foo/bar", "ratio", 0.32);
    collect.add_config_item("/foo/bar", "yesorno", true);

    let pr1 = map.add_process(
        ProcessNode::new("machine", 1)
            .with_config_item("username", "wat")
            .with_config_item("howmuch", 9999),
    );
    let pr12 = map.add_process(
        ProcessNode::new("machine", 1)
            .with_config_item("username", "wat2")
            .with_config_item("howmuch", 99992),
    );
    let pu1 = map.add_publish(
        PublishNode::new("rmq", -1)
            .with_config_item("birthplace", "dallas")
            .with_config_item("monies", 2),
    );
    let pu2 = map.add_publish(
        PublishNode::new("file", -1)
            .with_config_item("color", "brown")
            .with_config_item("purpose", 42),
    );

    map.attach(pr12, pu2).expect("machine accepts children");
    map.attach(pr1, pr12).expect("machine accepts children");
    map.attach(map.root(), pr1).expect("collect accepts children");
    map.attach(map.root(), pu1).expect("collect accepts children");
    map
}

pub(crate) fn sample_pipeline(manager: &MockManager) -> Pipeline {
    compile(&sample_map(), manager).expect("sample map compiles")
}

/// Ticks every `interval`, reporting scripted states first and then
/// staying active.
pub(crate) struct ScriptedSchedule {
    interval: Duration,
    script: Mutex<VecDeque<ScheduleState>>,
}

impl ScriptedSchedule {
    pub(crate) fn new(interval: Duration, script: impl IntoIterator<Item = ScheduleState>) -> Self {
        Self {
            interval,
            script: Mutex::new(script.into_iter().collect()),
        }
    }
}

#[async_trait]
impl Schedule for ScriptedSchedule {
    fn validate(&self) -> Result<(), ScheduleError> {
        Ok(())
    }

    async fn wait(&self, _last: Option<Instant>) -> ScheduleResponse {
        tokio::time::sleep(self.interval).await;
        let now = Instant::now();
        let next = self.script.lock().pop_front();
        match next.unwrap_or(ScheduleState::Active) {
            ScheduleState::Active => ScheduleResponse::active(0, now),
            ScheduleState::Ended => ScheduleResponse::ended(now),
            ScheduleState::Error => ScheduleResponse::error(
                ScheduleError::Evaluation {
                    reason: "clock unavailable".to_string(),
                },
                now,
            ),
        }
    }
}

/// Sleeps in small steps until `condition` holds, for up to 100s of test time.
pub(crate) async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}
