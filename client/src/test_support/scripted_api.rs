//! Scripted [`TodoApi`] double with call counters and release gates.
//!
//! Reads and writes pop scripted results in order. A gated operation parks
//! until the test releases it, which lets tests observe the optimistic state
//! before a write settles or pile several readers onto one in-flight fetch.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::domain::ports::{FetchError, TodoApi};
use crate::domain::{Task, User, UserId};

/// Scripted outcome of one `put_task` call.
#[derive(Debug, Clone)]
pub enum PutScript {
    /// Echo the submitted task unchanged.
    Echo,
    /// Respond with this task instead of the submitted one.
    Respond(Task),
    /// Fail with this error.
    Fail(FetchError),
}

/// Scripted API double.
#[derive(Default)]
pub struct ScriptedTodoApi {
    users: Mutex<VecDeque<Result<Vec<User>, FetchError>>>,
    tasks: Mutex<VecDeque<Result<Vec<Task>, FetchError>>>,
    puts: Mutex<VecDeque<PutScript>>,
    submitted: Mutex<Vec<Task>>,
    user_calls: AtomicUsize,
    task_calls: AtomicUsize,
    put_calls: AtomicUsize,
    read_gate: Option<Semaphore>,
    put_gate: Option<Semaphore>,
}

fn exhausted() -> FetchError {
    FetchError::server_fault(500, "script exhausted")
}

impl ScriptedTodoApi {
    /// Empty script; every call fails until results are queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Park reads until [`Self::release_reads`] is called.
    #[must_use]
    pub fn with_gated_reads(mut self) -> Self {
        self.read_gate = Some(Semaphore::new(0));
        self
    }

    /// Park writes until [`Self::release_puts`] is called.
    #[must_use]
    pub fn with_gated_puts(mut self) -> Self {
        self.put_gate = Some(Semaphore::new(0));
        self
    }

    /// Queue a users response.
    #[must_use]
    pub fn push_users(self, result: Result<Vec<User>, FetchError>) -> Self {
        lock(&self.users).push_back(result);
        self
    }

    /// Queue a tasks response.
    #[must_use]
    pub fn push_tasks(self, result: Result<Vec<Task>, FetchError>) -> Self {
        lock(&self.tasks).push_back(result);
        self
    }

    /// Queue a write outcome.
    #[must_use]
    pub fn push_put(self, script: PutScript) -> Self {
        lock(&self.puts).push_back(script);
        self
    }

    /// Let `count` parked reads proceed.
    pub fn release_reads(&self, count: usize) {
        if let Some(gate) = &self.read_gate {
            gate.add_permits(count);
        }
    }

    /// Let `count` parked writes proceed.
    pub fn release_puts(&self, count: usize) {
        if let Some(gate) = &self.put_gate {
            gate.add_permits(count);
        }
    }

    /// Number of `fetch_users` calls so far.
    pub fn user_calls(&self) -> usize {
        self.user_calls.load(Ordering::SeqCst)
    }

    /// Number of `fetch_tasks_for_user` calls so far.
    pub fn task_calls(&self) -> usize {
        self.task_calls.load(Ordering::SeqCst)
    }

    /// Number of `put_task` calls so far.
    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    /// Tasks submitted through `put_task`, in order.
    pub fn submitted(&self) -> Vec<Task> {
        lock(&self.submitted).clone()
    }

    async fn pass(gate: Option<&Semaphore>) {
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl TodoApi for ScriptedTodoApi {
    async fn fetch_users(&self) -> Result<Vec<User>, FetchError> {
        self.user_calls.fetch_add(1, Ordering::SeqCst);
        Self::pass(self.read_gate.as_ref()).await;
        lock(&self.users).pop_front().unwrap_or_else(|| Err(exhausted()))
    }

    async fn fetch_tasks_for_user(&self, _user: UserId) -> Result<Vec<Task>, FetchError> {
        self.task_calls.fetch_add(1, Ordering::SeqCst);
        Self::pass(self.read_gate.as_ref()).await;
        lock(&self.tasks).pop_front().unwrap_or_else(|| Err(exhausted()))
    }

    async fn put_task(&self, task: &Task) -> Result<Task, FetchError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.submitted).push(task.clone());
        Self::pass(self.put_gate.as_ref()).await;
        match lock(&self.puts).pop_front() {
            Some(PutScript::Echo) => Ok(task.clone()),
            Some(PutScript::Respond(echoed)) => Ok(echoed),
            Some(PutScript::Fail(error)) => Err(error),
            None => Err(exhausted()),
        }
    }
}
