//! 集成测试公共支撑：可命名线程池执行器、探针订阅者与等待辅助。
//!
//! # 教案级导览
//! - **Why**：信号迁移的断言核心是"回调落在哪个线程"，因此支撑层提供
//!   记录线程归属的池执行器与逐信号留痕的探针订阅者；
//! - **How**：池执行器以标准库线程加通道实现，成员线程启动时登记
//!   `ThreadId`，`is_current_thread_in` 即成员集合查询；探针把每个信号连同
//!   到达线程压入共享向量，并以通道通知"已订阅/已终止"；
//! - **What**：所有等待均带超时，测试不会因信号缺失而悬挂。

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use strand_core::prelude::*;

/// 固定成员的测试线程池：记录成员线程，支持一键切换为拒绝态。
pub struct PoolExecutor {
    name: &'static str,
    sender: Mutex<Option<mpsc::Sender<Task>>>,
    members: Arc<Mutex<HashSet<ThreadId>>>,
    rejecting: AtomicBool,
}

impl PoolExecutor {
    /// 启动 `threads` 个工作线程并等待全部完成登记。
    pub fn new(name: &'static str, threads: usize) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel::<Task>();
        let receiver = Arc::new(Mutex::new(receiver));
        let members = Arc::new(Mutex::new(HashSet::new()));
        for index in 0..threads {
            let receiver = receiver.clone();
            let members = members.clone();
            thread::Builder::new()
                .name(format!("{name}-{index}"))
                .spawn(move || {
                    members
                        .lock()
                        .expect("成员登记锁不应中毒")
                        .insert(thread::current().id());
                    loop {
                        let next = {
                            let guard = receiver.lock().expect("任务通道锁不应中毒");
                            guard.recv()
                        };
                        match next {
                            Ok(task) => task(),
                            Err(_) => break,
                        }
                    }
                })
                .expect("测试线程必须成功启动");
        }
        let deadline = Instant::now() + Duration::from_secs(5);
        while members.lock().expect("成员登记锁不应中毒").len() < threads {
            assert!(Instant::now() < deadline, "工作线程登记超时");
            thread::yield_now();
        }
        Arc::new(Self {
            name,
            sender: Mutex::new(Some(sender)),
            members,
            rejecting: AtomicBool::new(false),
        })
    }

    /// 切换拒绝态：拒绝态下所有提交立即返回 `RejectedError`。
    pub fn set_rejecting(&self, value: bool) {
        self.rejecting.store(value, Ordering::SeqCst);
    }

    /// 查询给定线程是否属于本池。
    pub fn contains(&self, id: ThreadId) -> bool {
        self.members.lock().expect("成员登记锁不应中毒").contains(&id)
    }
}

impl Executor for PoolExecutor {
    fn execute(&self, task: Task) -> Result<(), RejectedError> {
        if self.rejecting.load(Ordering::SeqCst) {
            return Err(RejectedError::new(format!("{} rejecting", self.name)));
        }
        let guard = self.sender.lock().expect("任务通道锁不应中毒");
        match guard.as_ref() {
            Some(sender) => sender
                .send(task)
                .map_err(|_| RejectedError::new(format!("{} stopped", self.name))),
            None => Err(RejectedError::new(format!("{} stopped", self.name))),
        }
    }

    fn is_current_thread_in(&self) -> bool {
        self.contains(thread::current().id())
    }
}

/// 给测试池补上迁移能力的包装：迁移器直接绑定内部池。
pub struct OffloadAwarePool {
    pool: Arc<PoolExecutor>,
}

impl OffloadAwarePool {
    pub fn new(pool: Arc<PoolExecutor>) -> Self {
        Self { pool }
    }
}

impl Executor for OffloadAwarePool {
    fn execute(&self, task: Task) -> Result<(), RejectedError> {
        self.pool.execute(task)
    }

    fn is_current_thread_in(&self) -> bool {
        self.pool.is_current_thread_in()
    }
}

impl OffloadAwareExecutor for OffloadAwarePool {
    fn new_offloader(&self) -> SignalOffloader {
        SignalOffloader::context(self.pool.clone())
    }
}

/// 记录取消落点线程的取消回执。
#[derive(Clone, Default)]
pub struct CancelRecorder {
    cancelled_on: Arc<Mutex<Vec<ThreadId>>>,
}

impl CancelRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancelled_threads(&self) -> Vec<ThreadId> {
        self.cancelled_on.lock().expect("取消记录锁不应中毒").clone()
    }
}

impl Cancellable for CancelRecorder {
    fn cancel(&self) {
        self.cancelled_on
            .lock()
            .expect("取消记录锁不应中毒")
            .push(thread::current().id());
    }
}

/// 单值订阅者观察到的信号。
#[derive(Clone, Debug)]
pub enum SingleEvent<T> {
    Subscribe(ThreadId),
    Success(T, ThreadId),
    Error(String, ThreadId),
}

/// 单值探针：逐信号留痕并提供带超时的等待。
pub struct SingleProbe<T> {
    events: Arc<Mutex<Vec<SingleEvent<T>>>>,
    subscribed: mpsc::Receiver<()>,
    terminal: mpsc::Receiver<()>,
    cancellable: Arc<Mutex<Option<BoxCancellable>>>,
}

impl<T: Send + 'static> SingleProbe<T> {
    pub fn subscriber() -> (BoxSingleSubscriber<T>, SingleProbe<T>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let (subscribed_tx, subscribed_rx) = mpsc::channel();
        let (terminal_tx, terminal_rx) = mpsc::channel();
        let cancellable = Arc::new(Mutex::new(None));
        let subscriber = SingleProbeSubscriber {
            events: events.clone(),
            subscribed: subscribed_tx,
            terminal: terminal_tx,
            cancellable: cancellable.clone(),
        };
        (
            Box::new(subscriber),
            SingleProbe {
                events,
                subscribed: subscribed_rx,
                terminal: terminal_rx,
                cancellable,
            },
        )
    }

    pub fn wait_subscribed(&self, timeout: Duration) {
        self.subscribed
            .recv_timeout(timeout)
            .expect("必须收到初始通知");
    }

    pub fn wait_terminal(&self, timeout: Duration) {
        self.terminal
            .recv_timeout(timeout)
            .expect("必须收到终止信号");
    }

    pub fn expect_no_terminal(&self, timeout: Duration) {
        assert!(
            self.terminal.recv_timeout(timeout).is_err(),
            "终止信号不应提前到达"
        );
    }

    pub fn take_cancellable(&self) -> BoxCancellable {
        self.cancellable
            .lock()
            .expect("取消回执锁不应中毒")
            .take()
            .expect("初始通知必须携带取消回执")
    }

    pub fn snapshot(&self) -> Vec<SingleEvent<T>>
    where
        T: Clone,
    {
        self.events.lock().expect("事件锁不应中毒").clone()
    }
}

struct SingleProbeSubscriber<T> {
    events: Arc<Mutex<Vec<SingleEvent<T>>>>,
    subscribed: mpsc::Sender<()>,
    terminal: mpsc::Sender<()>,
    cancellable: Arc<Mutex<Option<BoxCancellable>>>,
}

impl<T: Send + 'static> SingleSubscriber<T> for SingleProbeSubscriber<T> {
    fn on_subscribe(&mut self, cancellable: BoxCancellable) {
        *self.cancellable.lock().expect("取消回执锁不应中毒") = Some(cancellable);
        self.events
            .lock()
            .expect("事件锁不应中毒")
            .push(SingleEvent::Subscribe(thread::current().id()));
        let _ = self.subscribed.send(());
    }

    fn on_success(&mut self, value: T) {
        self.events
            .lock()
            .expect("事件锁不应中毒")
            .push(SingleEvent::Success(value, thread::current().id()));
        let _ = self.terminal.send(());
    }

    fn on_error(&mut self, error: StrandError) {
        self.events
            .lock()
            .expect("事件锁不应中毒")
            .push(SingleEvent::Error(error.code().to_string(), thread::current().id()));
        let _ = self.terminal.send(());
    }
}

/// 流式订阅者观察到的信号。
#[derive(Clone, Debug)]
pub enum StreamEvent<T> {
    Subscribe(ThreadId),
    Next(T, ThreadId),
    Complete(ThreadId),
    Error(String, ThreadId),
}

/// 流式探针；语义同 [`SingleProbe`]。
pub struct StreamProbe<T> {
    events: Arc<Mutex<Vec<StreamEvent<T>>>>,
    subscribed: mpsc::Receiver<()>,
    terminal: mpsc::Receiver<()>,
    cancellable: Arc<Mutex<Option<BoxCancellable>>>,
}

impl<T: Send + 'static> StreamProbe<T> {
    pub fn subscriber() -> (BoxSubscriber<T>, StreamProbe<T>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let (subscribed_tx, subscribed_rx) = mpsc::channel();
        let (terminal_tx, terminal_rx) = mpsc::channel();
        let cancellable = Arc::new(Mutex::new(None));
        let subscriber = StreamProbeSubscriber {
            events: events.clone(),
            subscribed: subscribed_tx,
            terminal: terminal_tx,
            cancellable: cancellable.clone(),
        };
        (
            Box::new(subscriber),
            StreamProbe {
                events,
                subscribed: subscribed_rx,
                terminal: terminal_rx,
                cancellable,
            },
        )
    }

    pub fn wait_subscribed(&self, timeout: Duration) {
        self.subscribed
            .recv_timeout(timeout)
            .expect("必须收到初始通知");
    }

    pub fn wait_terminal(&self, timeout: Duration) {
        self.terminal
            .recv_timeout(timeout)
            .expect("必须收到终止信号");
    }

    pub fn take_cancellable(&self) -> BoxCancellable {
        self.cancellable
            .lock()
            .expect("取消回执锁不应中毒")
            .take()
            .expect("初始通知必须携带取消回执")
    }

    pub fn snapshot(&self) -> Vec<StreamEvent<T>>
    where
        T: Clone,
    {
        self.events.lock().expect("事件锁不应中毒").clone()
    }

    /// 轮询等待直到事件快照满足谓词；超时 panic。
    pub fn wait_until(&self, timeout: Duration, predicate: impl Fn(&[StreamEvent<T>]) -> bool)
    where
        T: Clone,
    {
        let deadline = Instant::now() + timeout;
        loop {
            if predicate(&self.snapshot()) {
                return;
            }
            assert!(Instant::now() < deadline, "等待事件超时");
            thread::sleep(Duration::from_millis(2));
        }
    }
}

struct StreamProbeSubscriber<T> {
    events: Arc<Mutex<Vec<StreamEvent<T>>>>,
    subscribed: mpsc::Sender<()>,
    terminal: mpsc::Sender<()>,
    cancellable: Arc<Mutex<Option<BoxCancellable>>>,
}

impl<T: Send + 'static> Subscriber<T> for StreamProbeSubscriber<T> {
    fn on_subscribe(&mut self, cancellable: BoxCancellable) {
        *self.cancellable.lock().expect("取消回执锁不应中毒") = Some(cancellable);
        self.events
            .lock()
            .expect("事件锁不应中毒")
            .push(StreamEvent::Subscribe(thread::current().id()));
        let _ = self.subscribed.send(());
    }

    fn on_next(&mut self, item: T) {
        self.events
            .lock()
            .expect("事件锁不应中毒")
            .push(StreamEvent::Next(item, thread::current().id()));
    }

    fn on_complete(&mut self) {
        self.events
            .lock()
            .expect("事件锁不应中毒")
            .push(StreamEvent::Complete(thread::current().id()));
        let _ = self.terminal.send(());
    }

    fn on_error(&mut self, error: StrandError) {
        self.events
            .lock()
            .expect("事件锁不应中毒")
            .push(StreamEvent::Error(error.code().to_string(), thread::current().id()));
        let _ = self.terminal.send(());
    }
}

/// 阻塞等待单值来源的终止信号，带超时保护由 oneshot 通道天然提供。
pub fn await_single<T: Send + 'static>(single: BoxSingle<T>) -> Result<T, StrandError> {
    struct Forward<T> {
        sender: Option<futures::channel::oneshot::Sender<Result<T, StrandError>>>,
    }

    impl<T: Send + 'static> SingleSubscriber<T> for Forward<T> {
        fn on_subscribe(&mut self, _cancellable: BoxCancellable) {}

        fn on_success(&mut self, value: T) {
            if let Some(sender) = self.sender.take() {
                let _ = sender.send(Ok(value));
            }
        }

        fn on_error(&mut self, error: StrandError) {
            if let Some(sender) = self.sender.take() {
                let _ = sender.send(Err(error));
            }
        }
    }

    let (sender, receiver) = futures::channel::oneshot::channel();
    single.subscribe(Box::new(Forward {
        sender: Some(sender),
    }));
    futures::executor::block_on(receiver).expect("单值来源必须交付终止信号")
}

/// 可手动触发的完成信号源，供测试成员客户端使用。
#[derive(Clone, Default)]
pub struct ManualCompletion {
    state: Arc<Mutex<ManualState>>,
}

#[derive(Default)]
struct ManualState {
    done: bool,
    waiters: Vec<BoxSingleSubscriber<()>>,
}

impl ManualCompletion {
    pub fn new() -> Self {
        Self::default()
    }

    /// 触发完成并唤醒全部等待者。
    pub fn complete(&self) {
        let waiters = {
            let mut state = self.state.lock().expect("完成源锁不应中毒");
            if state.done {
                Vec::new()
            } else {
                state.done = true;
                std::mem::take(&mut state.waiters)
            }
        };
        for mut waiter in waiters {
            waiter.on_success(());
        }
    }

    /// 产出一个可多次订阅的完成信号视图。
    pub fn completion(&self) -> BoxCompletion {
        let state = self.state.clone();
        strand_core::concurrent::single::deferred(move |mut subscriber| {
            subscriber.on_subscribe(Box::new(NoopCancellable));
            let mut guard = state.lock().expect("完成源锁不应中毒");
            if guard.done {
                drop(guard);
                subscriber.on_success(());
            } else {
                guard.waiters.push(subscriber);
            }
        })
    }
}

/// 记录关闭调用次数的测试成员客户端。
pub struct TestClient {
    label: String,
    pub close_calls: AtomicUsize,
    pub graceful_calls: AtomicUsize,
    close_signal: ManualCompletion,
    auto_complete_close: bool,
}

impl TestClient {
    /// 关闭即刻完成的成员。
    pub fn auto(label: impl Into<String>) -> Self {
        Self::build(label, true)
    }

    /// 关闭需测试方手动 [`ManualCompletion::complete`] 的成员。
    pub fn manual(label: impl Into<String>) -> Self {
        Self::build(label, false)
    }

    fn build(label: impl Into<String>, auto_complete_close: bool) -> Self {
        Self {
            label: label.into(),
            close_calls: AtomicUsize::new(0),
            graceful_calls: AtomicUsize::new(0),
            close_signal: ManualCompletion::new(),
            auto_complete_close,
        }
    }

    pub fn close_signal(&self) -> ManualCompletion {
        self.close_signal.clone()
    }
}

impl KeyedClient for TestClient {
    type Request = u64;
    type Response = String;
    type Reserved = String;
    type Upgrade = String;

    fn request(&self, request: u64) -> BoxSingle<String> {
        strand_core::concurrent::single::succeeded(format!("{}:{request}", self.label))
    }

    fn reserve_connection(&self, request: u64) -> BoxSingle<String> {
        strand_core::concurrent::single::succeeded(format!("reserved:{}:{request}", self.label))
    }

    fn upgrade_connection(&self, request: u64) -> BoxSingle<String> {
        strand_core::concurrent::single::succeeded(format!("upgraded:{}:{request}", self.label))
    }

    fn on_close(&self) -> BoxCompletion {
        self.close_signal.completion()
    }

    fn close_async(&self) -> BoxCompletion {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.auto_complete_close {
            self.close_signal.complete();
        }
        self.close_signal.completion()
    }

    fn close_async_gracefully(&self) -> BoxCompletion {
        self.graceful_calls.fetch_add(1, Ordering::SeqCst);
        if self.auto_complete_close {
            self.close_signal.complete();
        }
        self.close_signal.completion()
    }
}

/// 逐调用留痕的测试客户端组，用于门面透传断言。
#[derive(Default)]
pub struct RecordingGroup {
    pub calls: Arc<Mutex<Vec<(String, &'static str, u64)>>>,
    pub close_calls: AtomicUsize,
    pub graceful_close_calls: AtomicUsize,
}

impl RecordingGroup {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, op: &str, key: &GroupKey<&'static str>, request: u64) {
        self.calls
            .lock()
            .expect("调用记录锁不应中毒")
            .push((op.to_string(), *key.address(), request));
    }

    pub fn recorded(&self) -> Vec<(String, &'static str, u64)> {
        self.calls.lock().expect("调用记录锁不应中毒").clone()
    }
}

impl ClientGroup for RecordingGroup {
    type Address = &'static str;
    type Request = u64;
    type Response = String;
    type Reserved = String;
    type Upgrade = String;

    fn request(&self, key: GroupKey<&'static str>, request: u64) -> BoxSingle<String> {
        self.record("request", &key, request);
        strand_core::concurrent::single::succeeded(format!("{}#{request}", key.address()))
    }

    fn reserve_connection(&self, key: GroupKey<&'static str>, request: u64) -> BoxSingle<String> {
        self.record("reserve", &key, request);
        strand_core::concurrent::single::succeeded(format!("reserve:{}#{request}", key.address()))
    }

    fn upgrade_connection(&self, key: GroupKey<&'static str>, request: u64) -> BoxSingle<String> {
        self.record("upgrade", &key, request);
        strand_core::concurrent::single::succeeded(format!("upgrade:{}#{request}", key.address()))
    }

    fn on_close(&self) -> BoxCompletion {
        strand_core::concurrent::single::succeeded(())
    }

    fn close_async(&self) -> BoxCompletion {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        strand_core::concurrent::single::succeeded(())
    }

    fn close_async_gracefully(&self) -> BoxCompletion {
        self.graceful_close_calls.fetch_add(1, Ordering::SeqCst);
        strand_core::concurrent::single::succeeded(())
    }
}
