//! # 信号迁移模块
//!
//! ## 契约声明
//! * **迁移透明：** 被包裹的接收方收到与未包裹时完全相同的信号序列与内容，
//!   只是可能换了线程；次序保持——E1 未处理完毕之前 E2 不开始处理。
//! * **每订阅一器：** 迁移器由 `new_offloader()` 按订阅尝试新建，
//!   订阅终止或取消后即弃，从不复用、从不池化。
//! * **拒绝即错误信号：** 目标上下文拒绝调度时，失败以错误信号交付给被
//!   包裹的接收方，绝不同步抛回重派发的调用方，也绝不静默丢弃。
//!
//! ## 类别到上下文的分派
//! * 发布路径（值 / 完成 / 错误 / 成功）→ 发布上下文；
//! * 初始通知、取消、订阅动作本身、任意一次性信号 → 控制上下文；
//! * 两条快路径（"当前线程已是发布/控制上下文"）分别查询对应上下文，
//!   自身绝不触发线程迁移。
//!
//! 合并形态下发布上下文即主执行器、控制上下文即备援执行器；单上下文
//! 形态下两者同一。该映射是本模块的全部算法内容，不得偏差。

mod queue;
mod subscriber;

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use self::subscriber::{OffloadedCancellable, offload_single_receiver, offload_stream_receiver};
use crate::concurrent::{
    Attempt, BoxCancellable, BoxPublisher, BoxSingle, BoxSingleSubscriber, BoxSubscriber,
    NoopCancellable, Publisher, Single,
};
use crate::error::StrandError;
use crate::executor::{Executor, OffloadAwareExecutor, Task};

/// 绑定单一执行上下文的迁移器：所有类别都落同一上下文。
pub struct ContextOffloader {
    context: Arc<dyn Executor>,
}

/// 合并迁移器：发布类别与控制类别分别委托给两个子迁移器。
///
/// 两个子迁移器在构造期一次性建成，并在本迁移器（即一次订阅尝试）的
/// 生命周期内持有；控制子迁移器可能直接来自备援执行器自产的实现，
/// 彼时不会再被包裹一层。
pub struct MergedOffloader {
    publish: Box<SignalOffloader>,
    control: Box<SignalOffloader>,
}

/// 信号迁移器的能力分型：单上下文或合并形态，构造期一次判定。
///
/// # 设计背景（Why）
/// - 迁移操作按值类别泛型化，无法塞进对象安全接口；以枚举承载两种形态，
///   `new_offloader()` 仍可按值返回，类别分派退化为一次 `match`；
/// - 合并形态递归持有子迁移器，"合并之合并"自然成立：发布类别沿发布链
///   下钻，控制类别沿控制链下钻。
pub enum SignalOffloader {
    /// 所有类别共用一个上下文。
    Context(ContextOffloader),
    /// 发布/控制类别各有归属。
    Merged(MergedOffloader),
}

impl SignalOffloader {
    /// 构造绑定给定上下文的单一迁移器。
    pub fn context(executor: Arc<dyn Executor>) -> Self {
        SignalOffloader::Context(ContextOffloader { context: executor })
    }

    /// 以发布侧与控制侧子迁移器构造合并迁移器。
    pub fn merged(publish: SignalOffloader, control: SignalOffloader) -> Self {
        SignalOffloader::Merged(MergedOffloader {
            publish: Box::new(publish),
            control: Box::new(control),
        })
    }

    fn publish_context(&self) -> &Arc<dyn Executor> {
        match self {
            SignalOffloader::Context(offloader) => &offloader.context,
            SignalOffloader::Merged(offloader) => offloader.publish.publish_context(),
        }
    }

    fn control_context(&self) -> &Arc<dyn Executor> {
        match self {
            SignalOffloader::Context(offloader) => &offloader.context,
            SignalOffloader::Merged(offloader) => offloader.control.control_context(),
        }
    }

    /// 快路径：当前线程是否已是发布上下文。纯查询，不触发迁移。
    pub fn publish_thread_in_context(&self) -> bool {
        self.publish_context().is_current_thread_in()
    }

    /// 快路径：当前线程是否已是控制上下文。纯查询，不触发迁移。
    pub fn control_thread_in_context(&self) -> bool {
        self.control_context().is_current_thread_in()
    }

    /// 包裹流式订阅者：值/完成/错误迁移到发布上下文，
    /// 初始通知与取消迁移到控制上下文。
    pub fn offload_subscriber<T: Send + 'static>(
        &self,
        receiver: BoxSubscriber<T>,
    ) -> BoxSubscriber<T> {
        offload_stream_receiver(
            receiver,
            self.publish_context().clone(),
            self.control_context().clone(),
        )
    }

    /// 包裹单值订阅者：成功/错误迁移到发布上下文，
    /// 初始通知与取消迁移到控制上下文。
    pub fn offload_single_subscriber<T: Send + 'static>(
        &self,
        receiver: BoxSingleSubscriber<T>,
    ) -> BoxSingleSubscriber<T> {
        offload_single_receiver(
            receiver,
            self.publish_context().clone(),
            self.control_context().clone(),
        )
    }

    /// 包裹独立的取消回执：取消动作迁移到控制上下文。
    pub fn offload_cancellable(&self, cancellable: BoxCancellable) -> BoxCancellable {
        Box::new(OffloadedCancellable::bound(
            Arc::from(cancellable),
            self.control_context().clone(),
            None,
        ))
    }

    /// 在控制上下文上执行"把订阅者挂接到单值来源"这一动作本身。
    ///
    /// # 契约说明（What）
    /// - 调用线程已在控制上下文时就地挂接（快路径）；
    /// - 上下文拒绝调度时，订阅者被取回并就地收到
    ///   "初始通知 + 拒绝错误"，初始通知恰好一次的承诺不被破坏。
    pub fn offload_subscribe<T: Send + 'static>(
        &self,
        producer: Arc<dyn Single<T>>,
        receiver: BoxSingleSubscriber<T>,
    ) {
        let context = self.control_context().clone();
        if context.is_current_thread_in() {
            producer.subscribe(receiver);
            return;
        }
        let slot = Arc::new(Mutex::new(Some(receiver)));
        let dispatch_slot = slot.clone();
        let outcome = context.execute(Box::new(move || {
            if let Some(receiver) = dispatch_slot.lock().take() {
                producer.subscribe(receiver);
            }
        }));
        if let Err(rejected) = outcome {
            if let Some(receiver) = slot.lock().take() {
                Attempt::begin_untracked(receiver).fail(rejected.into());
            }
        }
    }

    /// 流式来源版本的订阅动作迁移；契约同 [`offload_subscribe`](Self::offload_subscribe)。
    pub fn offload_subscribe_stream<T: Send + 'static>(
        &self,
        producer: Arc<dyn Publisher<T>>,
        receiver: BoxSubscriber<T>,
    ) {
        let context = self.control_context().clone();
        if context.is_current_thread_in() {
            producer.subscribe(receiver);
            return;
        }
        let slot = Arc::new(Mutex::new(Some(receiver)));
        let dispatch_slot = slot.clone();
        let outcome = context.execute(Box::new(move || {
            if let Some(receiver) = dispatch_slot.lock().take() {
                producer.subscribe(receiver);
            }
        }));
        if let Err(rejected) = outcome {
            if let Some(mut receiver) = slot.lock().take() {
                receiver.on_subscribe(Box::new(NoopCancellable));
                receiver.on_error(rejected.into());
            }
        }
    }

    /// 在控制上下文上执行任意一次性回调（预约/升级等流程的零散调度口）。
    ///
    /// 返回 `Err` 表示上下文拒绝且回调未执行，调用方应将其汇入自身的
    /// 异步错误通道。
    pub fn offload_signal(&self, signal: Task) -> Result<(), StrandError> {
        let context = self.control_context();
        if context.is_current_thread_in() {
            signal();
            return Ok(());
        }
        context.execute(signal).map_err(|rejected| {
            trace!(reason = rejected.reason(), "one-off signal rejected by control context");
            rejected.into()
        })
    }
}

/// 以迁移策略装饰单值来源：每次订阅新建迁移器，订阅动作与各信号
/// 按类别落到执行器规定的上下文上。
pub fn offloaded_single<T: Send + 'static>(
    producer: Arc<dyn Single<T>>,
    executor: Arc<dyn OffloadAwareExecutor>,
) -> BoxSingle<T> {
    Box::new(OffloadedSingle { producer, executor })
}

/// 以迁移策略装饰流式来源；语义同 [`offloaded_single`]。
pub fn offloaded_publisher<T: Send + 'static>(
    producer: Arc<dyn Publisher<T>>,
    executor: Arc<dyn OffloadAwareExecutor>,
) -> BoxPublisher<T> {
    Box::new(OffloadedPublisher { producer, executor })
}

struct OffloadedSingle<T> {
    producer: Arc<dyn Single<T>>,
    executor: Arc<dyn OffloadAwareExecutor>,
}

impl<T: Send + 'static> Single<T> for OffloadedSingle<T> {
    fn subscribe(&self, subscriber: BoxSingleSubscriber<T>) {
        let offloader = self.executor.new_offloader();
        let wrapped = offloader.offload_single_subscriber(subscriber);
        offloader.offload_subscribe(self.producer.clone(), wrapped);
    }
}

struct OffloadedPublisher<T> {
    producer: Arc<dyn Publisher<T>>,
    executor: Arc<dyn OffloadAwareExecutor>,
}

impl<T: Send + 'static> Publisher<T> for OffloadedPublisher<T> {
    fn subscribe(&self, subscriber: BoxSubscriber<T>) {
        let offloader = self.executor.new_offloader();
        let wrapped = offloader.offload_subscriber(subscriber);
        offloader.offload_subscribe_stream(self.producer.clone(), wrapped);
    }
}
