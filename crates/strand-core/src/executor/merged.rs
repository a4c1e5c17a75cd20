use std::sync::Arc;

use super::{Executor, ExecutorKind, OffloadAwareExecutor, Task};
use crate::error::RejectedError;
use crate::offload::SignalOffloader;

/// 合并两套独立配置的迁移策略的执行上下文装饰器。
///
/// # 设计背景（Why）
/// - 管线常希望用户可见的数据回调跑在专用工作池上，同时把订阅建立与
///   取消簿记留在调用方或传输层线程，避免热控制路径上的额外一跳；
/// - 两个诉求各自对应一个执行上下文，合并后必须同时兑现双方的承诺：
///   发布侧信号只落主上下文，控制侧信号只落备援上下文。
///
/// # 逻辑解析（How）
/// - 构造期持有主上下文（发布侧）与备援上下文（控制侧）的能力分型；
/// - [`new_offloader`](OffloadAwareExecutor::new_offloader) 为每次订阅尝试
///   产出合并迁移器：发布子迁移器绑定主上下文，控制子迁移器直接复用
///   备援上下文自产的迁移器（备援自带迁移能力时绝不二次包裹）；
/// - 裸任务提交与线程归属查询按发布侧语义委托给主上下文。
///
/// # 契约说明（What）
/// - 信号类别到上下文的映射是本类型的全部算法内容，偏差会改变用户回调的
///   执行线程并可能重新引入该拆分旨在避免的死锁：
///   发布路径（值/完成/错误 + 发布侧快路径）→ 主上下文；
///   订阅建立、取消、订阅动作本身、任意一次性信号 + 控制侧快路径 → 备援上下文。
pub struct MergedOffloadExecutor {
    primary: Arc<dyn Executor>,
    fallback: ExecutorKind,
}

impl MergedOffloadExecutor {
    /// 以主上下文（发布侧）与备援上下文（控制侧）构造合并执行器。
    pub fn new(primary: Arc<dyn Executor>, fallback: ExecutorKind) -> Self {
        Self { primary, fallback }
    }

    /// 借出发布侧上下文。
    pub fn primary(&self) -> &Arc<dyn Executor> {
        &self.primary
    }

    /// 借出控制侧上下文的能力分型。
    pub fn fallback(&self) -> &ExecutorKind {
        &self.fallback
    }
}

impl Executor for MergedOffloadExecutor {
    fn execute(&self, task: Task) -> Result<(), RejectedError> {
        self.primary.execute(task)
    }

    fn is_current_thread_in(&self) -> bool {
        self.primary.is_current_thread_in()
    }
}

impl OffloadAwareExecutor for MergedOffloadExecutor {
    fn new_offloader(&self) -> SignalOffloader {
        SignalOffloader::merged(
            SignalOffloader::context(self.primary.clone()),
            self.fallback.new_offloader(),
        )
    }
}
