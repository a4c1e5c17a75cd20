use std::hash::Hash;
use std::mem;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::key::GroupKey;
use crate::concurrent::{
    BoxCancellable, BoxCompletion, BoxSingle, NoopCancellable, Single, SingleSubscriber, single,
};
use crate::error::{StrandError, codes};

/// 单目的地客户端契约：组按键管理的成员。
///
/// # 契约说明（What）
/// - 三个请求操作均返回惰性单值来源，订阅触发执行；
/// - 关闭操作幂等：重复触发不得产生额外副作用；
/// - `on_close` 的完成信号在客户端彻底关闭后触发，可被多次订阅。
pub trait KeyedClient: Send + Sync + 'static {
    /// 请求类型。
    type Request: Send + 'static;
    /// 响应类型。
    type Response: Send + 'static;
    /// 预留连接的句柄类型。
    type Reserved: Send + 'static;
    /// 协议升级的结果类型。
    type Upgrade: Send + 'static;

    /// 发起一次普通请求。
    fn request(&self, request: Self::Request) -> BoxSingle<Self::Response>;

    /// 预留一条专用连接。
    fn reserve_connection(&self, request: Self::Request) -> BoxSingle<Self::Reserved>;

    /// 发起协议升级。
    fn upgrade_connection(&self, request: Self::Request) -> BoxSingle<Self::Upgrade>;

    /// 订阅"已彻底关闭"完成信号。
    fn on_close(&self) -> BoxCompletion;

    /// 发起立即关闭。
    fn close_async(&self) -> BoxCompletion;

    /// 发起优雅关闭。
    fn close_async_gracefully(&self) -> BoxCompletion;
}

/// 按键分组的客户端群契约：路由门面唯一依赖的协作者接口。
///
/// # 契约说明（What）
/// - 键相等的请求由同一个成员客户端服务；并发首次访问同一键时至多创建
///   一个成员（创建竞态的裁决由实现自身的同步机制保证）；
/// - 组整体可关闭，`on_close` 聚合"全部成员已关闭"；
/// - 组关闭后对新键与旧键的请求一律以 [`codes::GROUP_CLOSED`] 错误答复，
///   错误经异步信号通道送达。
pub trait ClientGroup: Send + Sync + 'static {
    /// 目的地址类型。
    type Address: Clone + Eq + Hash + Send + Sync + 'static;
    /// 请求类型。
    type Request: Send + 'static;
    /// 响应类型。
    type Response: Send + 'static;
    /// 预留连接的句柄类型。
    type Reserved: Send + 'static;
    /// 协议升级的结果类型。
    type Upgrade: Send + 'static;

    /// 将请求交给键对应的成员客户端。
    fn request(
        &self,
        key: GroupKey<Self::Address>,
        request: Self::Request,
    ) -> BoxSingle<Self::Response>;

    /// 在键对应的成员客户端上预留连接。
    fn reserve_connection(
        &self,
        key: GroupKey<Self::Address>,
        request: Self::Request,
    ) -> BoxSingle<Self::Reserved>;

    /// 在键对应的成员客户端上发起协议升级。
    fn upgrade_connection(
        &self,
        key: GroupKey<Self::Address>,
        request: Self::Request,
    ) -> BoxSingle<Self::Upgrade>;

    /// 订阅"整组已关闭"完成信号。
    fn on_close(&self) -> BoxCompletion;

    /// 发起整组立即关闭：调用即触发，返回的完成信号供观察收尾。
    /// 重复调用幂等，每个调用方都会收到恰好一次完成。
    fn close_async(&self) -> BoxCompletion;

    /// 发起整组优雅关闭；幂等语义同 [`close_async`](ClientGroup::close_async)。
    fn close_async_gracefully(&self) -> BoxCompletion;
}

/// `DefaultClientGroup` 是 [`ClientGroup`] 的内置实现：惰性创建、并发安全的
/// 键到成员映射，加整组关闭生命周期。
///
/// # 设计背景（Why）
/// - 路由门面只依赖 [`ClientGroup`] 契约，但完整的客户端运行时需要一个
///   开箱可用的组实现来承载"同键同客户端、至多创建一次"的保证；
/// - 并发映射选用分段锁实现：首次访问在分段锁内执行工厂，天然裁决
///   同键创建竞态，而查询路径近乎无争用。
///
/// # 逻辑解析（How）
/// - `entry().or_insert_with()` 保证同键并发首访只执行一次工厂；
/// - 关闭以一个原子位裁决"谁发起整组关闭"：胜者快照全部成员、武装
///   关闭闩、逐一触发成员关闭并订阅其完成信号；
/// - 关闭闩计数归零时向所有等待者交付完成信号；成员关闭报错按"已关闭"
///   计数（只记录告警），整组完成信号不因个别成员失败而悬空。
///
/// # 风险提示（Trade-offs）
/// - 关闭与首次创建存在窗口竞态：关闭快照之后才插入的成员会被补杀并对
///   调用方报 [`codes::GROUP_CLOSED`]，其关闭不计入闩——该成员从未被
///   交到任何调用方手上。
pub struct DefaultClientGroup<A, C>
where
    A: Clone + Eq + Hash + Send + Sync + 'static,
    C: KeyedClient,
{
    clients: DashMap<GroupKey<A>, Arc<C>>,
    factory: Box<dyn Fn(&GroupKey<A>) -> Arc<C> + Send + Sync>,
    closed: AtomicBool,
    latch: Arc<CloseLatch>,
}

impl<A, C> DefaultClientGroup<A, C>
where
    A: Clone + Eq + Hash + Send + Sync + 'static,
    C: KeyedClient,
{
    /// 以成员工厂构造空组。
    pub fn new(factory: impl Fn(&GroupKey<A>) -> Arc<C> + Send + Sync + 'static) -> Self {
        Self {
            clients: DashMap::new(),
            factory: Box::new(factory),
            closed: AtomicBool::new(false),
            latch: Arc::new(CloseLatch::default()),
        }
    }

    /// 当前存活的成员数量。
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// 组内是否尚无成员。
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    fn member(&self, key: &GroupKey<A>) -> Result<Arc<C>, StrandError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(group_closed_error());
        }
        let client = self
            .clients
            .entry(key.clone())
            .or_insert_with(|| (self.factory)(key))
            .value()
            .clone();
        if self.closed.load(Ordering::Acquire) {
            // 关闭快照可能没赶上这个刚插入的成员，就地补杀；
            // 它从未被交到调用方手上，关闭完成不计入整组闩。
            client.close_async().subscribe(Box::new(StragglerCloseWatch));
            return Err(group_closed_error());
        }
        Ok(client)
    }

    fn initiate_close(&self, graceful: bool) -> BoxCompletion {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let members: Vec<Arc<C>> = self
                .clients
                .iter()
                .map(|entry| entry.value().clone())
                .collect();
            debug!(graceful, members = members.len(), "closing client group");
            self.latch.arm(members.len());
            for client in members {
                let completion = if graceful {
                    client.close_async_gracefully()
                } else {
                    client.close_async()
                };
                completion.subscribe(Box::new(MemberCloseWatch {
                    latch: self.latch.clone(),
                }));
            }
        }
        self.latch.completion()
    }
}

impl<A, C> ClientGroup for DefaultClientGroup<A, C>
where
    A: Clone + Eq + Hash + Send + Sync + 'static,
    C: KeyedClient,
{
    type Address = A;
    type Request = C::Request;
    type Response = C::Response;
    type Reserved = C::Reserved;
    type Upgrade = C::Upgrade;

    fn request(
        &self,
        key: GroupKey<Self::Address>,
        request: Self::Request,
    ) -> BoxSingle<Self::Response> {
        match self.member(&key) {
            Ok(client) => client.request(request),
            Err(error) => single::failed(error),
        }
    }

    fn reserve_connection(
        &self,
        key: GroupKey<Self::Address>,
        request: Self::Request,
    ) -> BoxSingle<Self::Reserved> {
        match self.member(&key) {
            Ok(client) => client.reserve_connection(request),
            Err(error) => single::failed(error),
        }
    }

    fn upgrade_connection(
        &self,
        key: GroupKey<Self::Address>,
        request: Self::Request,
    ) -> BoxSingle<Self::Upgrade> {
        match self.member(&key) {
            Ok(client) => client.upgrade_connection(request),
            Err(error) => single::failed(error),
        }
    }

    fn on_close(&self) -> BoxCompletion {
        self.latch.completion()
    }

    fn close_async(&self) -> BoxCompletion {
        self.initiate_close(false)
    }

    fn close_async_gracefully(&self) -> BoxCompletion {
        self.initiate_close(true)
    }
}

fn group_closed_error() -> StrandError {
    StrandError::new(codes::GROUP_CLOSED, "client group is closed")
}

/// 整组关闭闩：聚合全部成员的关闭完成，向任意多个等待者广播。
#[derive(Default)]
struct CloseLatch {
    state: Mutex<LatchState>,
}

#[derive(Default)]
struct LatchState {
    armed: bool,
    pending: usize,
    completed: bool,
    waiters: Vec<BoxSingleSubscriberUnit>,
}

type BoxSingleSubscriberUnit = Box<dyn SingleSubscriber<()>>;

impl CloseLatch {
    /// 武装闩：记录待关闭成员数；无成员时立即完成。
    fn arm(&self, members: usize) {
        let waiters = {
            let mut state = self.state.lock();
            state.armed = true;
            state.pending = members;
            if members == 0 && !state.completed {
                state.completed = true;
                mem::take(&mut state.waiters)
            } else {
                Vec::new()
            }
        };
        notify_all(waiters);
    }

    /// 记一个成员已关闭；计数归零时广播完成。
    fn member_closed(&self) {
        let waiters = {
            let mut state = self.state.lock();
            if state.completed {
                return;
            }
            state.pending = state.pending.saturating_sub(1);
            if state.armed && state.pending == 0 {
                state.completed = true;
                mem::take(&mut state.waiters)
            } else {
                Vec::new()
            }
        };
        notify_all(waiters);
    }

    fn completion(self: &Arc<Self>) -> BoxCompletion {
        Box::new(LatchCompletion {
            latch: self.clone(),
        })
    }

    fn subscribe(&self, mut receiver: BoxSingleSubscriberUnit) {
        receiver.on_subscribe(Box::new(NoopCancellable));
        let mut state = self.state.lock();
        if state.completed {
            drop(state);
            receiver.on_success(());
        } else {
            state.waiters.push(receiver);
        }
    }
}

fn notify_all(waiters: Vec<BoxSingleSubscriberUnit>) {
    for mut waiter in waiters {
        waiter.on_success(());
    }
}

struct LatchCompletion {
    latch: Arc<CloseLatch>,
}

impl Single<()> for LatchCompletion {
    fn subscribe(&self, subscriber: BoxSingleSubscriberUnit) {
        self.latch.subscribe(subscriber);
    }
}

/// 吞掉补杀成员的关闭信号：只记录失败，不触碰整组闩。
struct StragglerCloseWatch;

impl SingleSubscriber<()> for StragglerCloseWatch {
    fn on_subscribe(&mut self, _cancellable: BoxCancellable) {}

    fn on_success(&mut self, _value: ()) {}

    fn on_error(&mut self, error: StrandError) {
        warn!(code = error.code(), "straggler close reported failure");
    }
}

struct MemberCloseWatch {
    latch: Arc<CloseLatch>,
}

impl SingleSubscriber<()> for MemberCloseWatch {
    fn on_subscribe(&mut self, _cancellable: BoxCancellable) {}

    fn on_success(&mut self, _value: ()) {
        self.latch.member_closed();
    }

    fn on_error(&mut self, error: StrandError) {
        warn!(code = error.code(), "member close reported failure");
        self.latch.member_closed();
    }
}
