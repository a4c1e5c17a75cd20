//! # 执行上下文契约模块
//!
//! ## 契约声明
//! * **Contract-only：** 本模块只定义"工作在哪里运行"的抽象接口与组合器，
//!   不落地任何线程池实现；具体执行器由宿主运行时或测试替身提供。
//! * **纯值查询：** "当前线程是否属于我"必须是作用在执行器值上的纯布尔查询，
//!   不得依赖隐式线程局部状态，也不得自身触发线程迁移。
//! * **拒绝即信号：** 执行器拒绝调度（例如关停中）通过 [`RejectedError`]
//!   返回给提交方，由迁移层转换为订阅者的错误信号，绝不静默丢弃。
//!
//! ## 线程归属快路径
//! * 快路径仅是尽力而为的优化：线程池在查询与使用之间可能扩缩容，
//!   过期的答案至多多付一次迁移或在刚离开池子的线程上就地执行；
//!   信号次序由迁移层的串行队列保证，正确性从不依赖该查询。

mod merged;

use std::fmt;
use std::sync::Arc;

pub use merged::MergedOffloadExecutor;

use crate::error::RejectedError;
use crate::offload::SignalOffloader;

/// 提交给执行上下文的一次性任务。
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// `Executor` 定义执行上下文的最小契约。
///
/// # 设计背景（Why）
/// - 迁移核心只负责把信号重定向到调用方显式选择的上下文，执行器本体
///   （线程池、事件循环）是外部协作者；
/// - 接口刻意最小化：一个提交入口加一个线程归属查询，便于宿主以任意
///   调度设施适配。
///
/// # 契约说明（What）
/// - **`execute`**：将任务入队到本上下文；返回 `Err` 表示任务未被且不会被
///   执行（调用方据此走兜底路径），返回 `Ok` 则任务最终恰好执行一次；
/// - **`is_current_thread_in`**：纯线程身份检查，绝不阻塞、绝不触发迁移；
///   答案是尽力而为的优化依据，而非安全前提。
///
/// # 风险提示（Trade-offs）
/// - 实现若在返回 `Ok` 后丢弃任务，将直接破坏"至多一次终止信号"之外的
///   另一半承诺（至少一次送达），属于契约违例。
pub trait Executor: Send + Sync {
    /// 将任务提交到本执行上下文。
    fn execute(&self, task: Task) -> Result<(), RejectedError>;

    /// 查询调用线程是否已属于本上下文。
    fn is_current_thread_in(&self) -> bool;
}

/// 可产出信号迁移器的执行上下文。
///
/// # 契约说明（What）
/// - [`new_offloader`](OffloadAwareExecutor::new_offloader) 为每次订阅尝试
///   产出一个新的迁移器，绑定到本上下文；迁移器从不跨订阅复用、从不池化；
/// - 组合器（如 [`MergedOffloadExecutor`]）据此避免对已具备迁移能力的
///   上下文二次包裹。
pub trait OffloadAwareExecutor: Executor {
    /// 产出绑定到本上下文的新迁移器。
    fn new_offloader(&self) -> SignalOffloader;
}

/// 执行上下文的能力分型：在构造期一次性判定，而非逐次调用时探测。
///
/// # 设计背景（Why）
/// - 合并迁移策略时需要知道备援上下文是否自带迁移能力（自带则直接复用其
///   迁移器，避免二次包裹）；该判定属于构造期事实，以枚举显式建模，
///   运行期只剩 `match` 分派。
#[derive(Clone)]
pub enum ExecutorKind {
    /// 仅具备最小执行契约的上下文。
    Plain(Arc<dyn Executor>),
    /// 自带迁移能力的上下文。
    OffloadAware(Arc<dyn OffloadAwareExecutor>),
}

impl ExecutorKind {
    /// 以最小执行契约视图借出底层上下文。
    pub fn executor(&self) -> Arc<dyn Executor> {
        match self {
            ExecutorKind::Plain(executor) => executor.clone(),
            ExecutorKind::OffloadAware(executor) => executor.clone(),
        }
    }

    /// 产出绑定到该上下文的迁移器；自带迁移能力者复用其自身实现。
    pub fn new_offloader(&self) -> SignalOffloader {
        match self {
            ExecutorKind::Plain(executor) => SignalOffloader::context(executor.clone()),
            ExecutorKind::OffloadAware(executor) => executor.new_offloader(),
        }
    }

    /// 查询调用线程是否属于该上下文。
    pub fn is_current_thread_in(&self) -> bool {
        match self {
            ExecutorKind::Plain(executor) => executor.is_current_thread_in(),
            ExecutorKind::OffloadAware(executor) => executor.is_current_thread_in(),
        }
    }
}

impl fmt::Debug for ExecutorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutorKind::Plain(_) => f.write_str("ExecutorKind::Plain"),
            ExecutorKind::OffloadAware(_) => f.write_str("ExecutorKind::OffloadAware"),
        }
    }
}

/// 就地执行器：任务在调用线程上立即运行。
///
/// # 契约说明（What）
/// - `execute` 同步运行任务后返回 `Ok`，从不拒绝；
/// - 任何线程都视为"属于"本上下文，因此以它作为目标的迁移全部走快路径；
/// - 适合作为控制侧的默认上下文：订阅与取消的簿记留在调用线程，
///   省去热控制路径上的额外一跳。
#[derive(Clone, Copy, Debug, Default)]
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, task: Task) -> Result<(), RejectedError> {
        task();
        Ok(())
    }

    fn is_current_thread_in(&self) -> bool {
        true
    }
}

impl OffloadAwareExecutor for InlineExecutor {
    fn new_offloader(&self) -> SignalOffloader {
        SignalOffloader::context(Arc::new(InlineExecutor))
    }
}
