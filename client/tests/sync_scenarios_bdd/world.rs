//! Scenario-world methods for the sync BDD tests.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use httpmock::MockServer;
use mockable::DefaultClock;
use taskboard::domain::{
    NoticeConfig, NoticeQueue, PersistedSelection, RemoteClient, RetryPolicy, SyncConfig,
    SyncCoordinator, Task, UserId,
};
use taskboard::outbound::address_bar::InMemoryAddressBar;
use taskboard::outbound::todo_api::TodoHttpSource;
use taskboard::test_support::ImmediateSleeper;
use tokio::runtime::Runtime;
use url::Url;

use crate::{App, CountingApi, RuntimeHandle, SyncScenarioWorld};

impl SyncScenarioWorld {
    /// Return the scenario's mock server, starting it on first use.
    pub fn server(&self) -> Arc<MockServer> {
        if let Some(server) = self.server.get() {
            return server;
        }
        let server = Arc::new(MockServer::start());
        self.server.set(server.clone());
        server
    }

    /// Wire the adapter, client, selection and coordinator against the mock
    /// server with the given request deadline.
    pub fn start_app(&self, timeout: Duration) {
        let runtime = Runtime::new().expect("create runtime");
        let base = Url::parse(&self.server().base_url()).expect("mock server url");
        let api = Arc::new(CountingApi::new(
            TodoHttpSource::new(base, timeout).expect("client builds"),
        ));
        let client = RemoteClient::with_sleeper(
            api.clone(),
            Arc::new(ImmediateSleeper),
            RetryPolicy::default(),
        );
        let address_bar = Arc::new(InMemoryAddressBar::new(
            Url::parse("http://localhost/board").expect("valid url"),
        ));
        let selection = PersistedSelection::load(address_bar.clone()).expect("selection loads");
        let clock = Arc::new(DefaultClock);
        let coordinator = SyncCoordinator::new(
            client,
            selection.subscribe(),
            NoticeQueue::new(clock.clone(), NoticeConfig::default()),
            clock,
            SyncConfig::default(),
        );

        self.runtime.set(RuntimeHandle(Arc::new(runtime)));
        self.api.set(api);
        self.app.set(Arc::new(App {
            address_bar,
            selection,
            coordinator,
        }));
    }

    /// Return the wired application.
    pub fn app(&self) -> Arc<App> {
        self.app.get().expect("app should be started")
    }

    /// Return the counting adapter.
    pub fn api(&self) -> Arc<CountingApi> {
        self.api.get().expect("app should be started")
    }

    /// Drive `future` to completion on the scenario runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        let runtime = self.runtime.get().expect("runtime should be set");
        runtime.0.block_on(future)
    }

    /// Load the tasks of `user` into the cache and remember them.
    pub fn preload_tasks(&self, user: UserId) {
        let app = self.app();
        let tasks = self
            .block_on(app.coordinator.tasks_for(user))
            .expect("tasks load");
        self.tasks_before.set(tasks);
    }

    /// Toggle `task`, recording the cached list seen while the write is in
    /// flight and the settled outcome.
    pub fn toggle(&self, task: Task) {
        let app = self.app();
        let api = self.api();
        let user = task.user_id;
        let (optimistic, outcome) = self.block_on(async move {
            let writer = app.clone();
            let toggle = tokio::spawn(async move { writer.coordinator.toggle_task(&task).await });
            for _ in 0..200 {
                if api.put_calls() == 1 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            let optimistic = app.coordinator.tasks_entry(user).data;
            let outcome = toggle.await.expect("toggle task joins");
            (optimistic, outcome)
        });
        if let Some(optimistic) = optimistic {
            self.optimistic.set(optimistic);
        }
        self.toggle_result.set(outcome);
    }
}
