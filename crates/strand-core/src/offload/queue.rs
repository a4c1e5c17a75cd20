use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::error::RejectedError;
use crate::executor::Executor;

/// 每订阅一条的串行信号队列：保证跨线程迁移后信号仍严格按序、互不重叠。
///
/// # 设计背景（Why）
/// - 生产者可能在任意线程上连续投递信号，而目标上下文的调度是异步的；
///   若每个信号独立提交，E1 与 E2 可能在池内并行或乱序处理；
/// - 以 FIFO 队列加"同一时刻至多一个排空任务"的约束，把乱序问题收敛为
///   单点排空循环。
///
/// # 逻辑解析（How）
/// - 入队后若无排空任务在跑且队列未被扣押，则占据排空权并调度一次排空；
/// - 排空循环逐个弹出并处理信号，队列取空时在锁内释放排空权，
///   与并发入队者的"检查-占据"互斥，不存在丢失唤醒；
/// - 调度前先查线程归属快路径：已在目标上下文时就地排空，省一次迁移。
///
/// # 契约说明（What）
/// - **扣押（hold）**：`new_held` 构造的队列先积攒信号，待
///   [`release`](SignalQueue::release) 后才开始排空——用于"初始通知先于
///   一切数据信号"的跨类别屏障；
/// - **拒绝**：调度被目标上下文拒绝时回退排空权并返回 `Err`，
///   信号仍留在队列中，由调用方决定清空与错误交付。
pub(crate) struct SignalQueue<S: Send + 'static> {
    executor: Arc<dyn Executor>,
    processor: Box<dyn Fn(S) + Send + Sync>,
    state: Mutex<QueueState<S>>,
}

struct QueueState<S> {
    entries: VecDeque<S>,
    draining: bool,
    held: bool,
}

impl<S: Send + 'static> SignalQueue<S> {
    /// 创建立即可排空的队列。
    pub(crate) fn new(
        executor: Arc<dyn Executor>,
        processor: Box<dyn Fn(S) + Send + Sync>,
    ) -> Arc<Self> {
        Self::build(executor, processor, false)
    }

    /// 创建处于扣押态的队列：积攒信号，等待 [`release`](SignalQueue::release)。
    pub(crate) fn new_held(
        executor: Arc<dyn Executor>,
        processor: Box<dyn Fn(S) + Send + Sync>,
    ) -> Arc<Self> {
        Self::build(executor, processor, true)
    }

    fn build(
        executor: Arc<dyn Executor>,
        processor: Box<dyn Fn(S) + Send + Sync>,
        held: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            executor,
            processor,
            state: Mutex::new(QueueState {
                entries: VecDeque::new(),
                draining: false,
                held,
            }),
        })
    }

    /// 入队一个信号，并在需要时调度排空。
    ///
    /// 返回 `Err` 表示目标上下文拒绝了排空任务；信号仍在队列中。
    pub(crate) fn enqueue(self: &Arc<Self>, signal: S) -> Result<(), RejectedError> {
        {
            let mut state = self.state.lock();
            state.entries.push_back(signal);
            if state.draining || state.held {
                return Ok(());
            }
            state.draining = true;
        }
        self.schedule()
    }

    /// 解除扣押；若有积压信号则立即调度一次排空。
    pub(crate) fn release(self: &Arc<Self>) -> Result<(), RejectedError> {
        {
            let mut state = self.state.lock();
            state.held = false;
            if state.draining || state.entries.is_empty() {
                return Ok(());
            }
            state.draining = true;
        }
        self.schedule()
    }

    /// 丢弃全部积压信号；用于终止后清场。
    pub(crate) fn clear(&self) {
        self.state.lock().entries.clear();
    }

    fn schedule(self: &Arc<Self>) -> Result<(), RejectedError> {
        if self.executor.is_current_thread_in() {
            self.drain();
            return Ok(());
        }
        let queue = Arc::clone(self);
        match self.executor.execute(Box::new(move || queue.drain())) {
            Ok(()) => Ok(()),
            Err(rejected) => {
                warn!(reason = rejected.reason(), "execution context rejected signal drain");
                self.state.lock().draining = false;
                Err(rejected)
            }
        }
    }

    fn drain(&self) {
        loop {
            let signal = {
                let mut state = self.state.lock();
                match state.entries.pop_front() {
                    Some(signal) => signal,
                    None => {
                        state.draining = false;
                        return;
                    }
                }
            };
            (self.processor)(signal);
        }
    }
}
