use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::group::ClientGroup;
use super::key::GroupKey;
use crate::concurrent::{Attempt, BoxCompletion, BoxSingle, BoxSingleSubscriber, Single};
use crate::error::{StrandError, codes};
use crate::executor::{ExecutorKind, InlineExecutor};

type KeyFn<G> = Arc<
    dyn Fn(
            &<G as ClientGroup>::Request,
        ) -> Result<GroupKey<<G as ClientGroup>::Address>, StrandError>
        + Send
        + Sync,
>;

/// 按键路由门面：把一组按目的地分桶的客户端呈现为单一逻辑客户端。
///
/// # 设计背景（Why）
/// - 调用方不应关心目的地分桶：发请求、预留连接、协议升级都只面向一个
///   门面，目的键由纯函数从请求推导；
/// - 键推导失败是一等错误路径而非程序缺陷：它与下游 I/O 失败走同一条
///   异步错误通道，绝不从获取异步值的调用中同步抛出。
///
/// # 逻辑解析（How）
/// - 三个请求操作返回惰性单值来源；订阅时才推导键——推导成功则把订阅者
///   原样转交给组内成员的结果（不包裹、不改写下游错误身份），失败则先
///   送达携带无操作取消回执的初始通知，再送达原始失败；
/// - 生命周期操作直接委托给组：门面除组引用外不占有任何资源，
///   也绝不放大关闭调用。
///
/// # 契约说明（What）
/// - 门面自身无可变状态，可跨线程共享；
/// - 组为共享引用（`Arc`）：组与门面同寿或更长寿；
/// - [`execution_context`](KeyedClientRouter::execution_context) 返回构造期
///   配置的执行上下文描述，纯查询无副作用。
pub struct KeyedClientRouter<G: ClientGroup> {
    group: Arc<G>,
    key_fn: KeyFn<G>,
    context: ExecutorKind,
}

impl<G: ClientGroup> KeyedClientRouter<G> {
    /// 进入构造器；`key_fn` 为请求到目的键的纯推导函数。
    pub fn builder(
        group: Arc<G>,
        key_fn: impl Fn(&G::Request) -> Result<GroupKey<G::Address>, StrandError>
        + Send
        + Sync
        + 'static,
    ) -> KeyedClientRouterBuilder<G> {
        KeyedClientRouterBuilder {
            group,
            key_fn: Arc::new(key_fn),
            context: ExecutorKind::OffloadAware(Arc::new(InlineExecutor)),
        }
    }

    /// 发起一次普通请求；最终响应经异步信号通道送达。
    pub fn request(&self, request: G::Request) -> BoxSingle<G::Response> {
        self.route(request, |group, key, request| group.request(key, request))
    }

    /// 为该请求的目的地预留一条专用连接。
    pub fn reserve_connection(&self, request: G::Request) -> BoxSingle<G::Reserved> {
        self.route(request, |group, key, request| {
            group.reserve_connection(key, request)
        })
    }

    /// 在该请求的目的地上发起协议升级。
    pub fn upgrade_connection(&self, request: G::Request) -> BoxSingle<G::Upgrade> {
        self.route(request, |group, key, request| {
            group.upgrade_connection(key, request)
        })
    }

    /// 返回构造期配置的执行上下文描述；纯查询。
    pub fn execution_context(&self) -> &ExecutorKind {
        &self.context
    }

    /// 订阅"整组已关闭"完成信号。
    pub fn on_close(&self) -> BoxCompletion {
        self.group.on_close()
    }

    /// 发起整组立即关闭；门面不做任何额外善后。
    pub fn close_async(&self) -> BoxCompletion {
        debug!("router delegating close to client group");
        self.group.close_async()
    }

    /// 发起整组优雅关闭；门面不做任何额外善后。
    pub fn close_async_gracefully(&self) -> BoxCompletion {
        debug!("router delegating graceful close to client group");
        self.group.close_async_gracefully()
    }

    fn route<Out: Send + 'static>(
        &self,
        request: G::Request,
        delegate: fn(&G, GroupKey<G::Address>, G::Request) -> BoxSingle<Out>,
    ) -> BoxSingle<Out> {
        Box::new(RoutedSingle {
            group: self.group.clone(),
            key_fn: self.key_fn.clone(),
            request: Mutex::new(Some(request)),
            delegate,
        })
    }
}

/// [`KeyedClientRouter`] 的构造器。
pub struct KeyedClientRouterBuilder<G: ClientGroup> {
    group: Arc<G>,
    key_fn: KeyFn<G>,
    context: ExecutorKind,
}

impl<G: ClientGroup> KeyedClientRouterBuilder<G> {
    /// 配置门面对外报告的执行上下文描述。
    pub fn execution_context(mut self, context: ExecutorKind) -> Self {
        self.context = context;
        self
    }

    /// 完成构造。
    pub fn build(self) -> KeyedClientRouter<G> {
        KeyedClientRouter {
            group: self.group,
            key_fn: self.key_fn,
            context: self.context,
        }
    }
}

/// 单次路由操作的惰性结果：订阅时推导键并转交订阅者。
struct RoutedSingle<G: ClientGroup, Out: Send + 'static> {
    group: Arc<G>,
    key_fn: KeyFn<G>,
    request: Mutex<Option<G::Request>>,
    delegate: fn(&G, GroupKey<G::Address>, G::Request) -> BoxSingle<Out>,
}

impl<G: ClientGroup, Out: Send + 'static> Single<Out> for RoutedSingle<G, Out> {
    fn subscribe(&self, subscriber: BoxSingleSubscriber<Out>) {
        let taken = self.request.lock().take();
        let Some(request) = taken else {
            Attempt::begin_untracked(subscriber).fail(StrandError::new(
                codes::SINGLE_CONSUMED,
                "routed request already consumed by an earlier subscription",
            ));
            return;
        };
        match (self.key_fn)(&request) {
            Ok(key) => (self.delegate)(&self.group, key, request).subscribe(subscriber),
            Err(error) => {
                debug!(code = error.code(), "destination key derivation failed");
                Attempt::begin_untracked(subscriber).fail(error);
            }
        }
    }
}
