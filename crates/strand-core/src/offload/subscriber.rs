use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{trace, warn};

use super::queue::SignalQueue;
use crate::concurrent::{
    BoxCancellable, BoxSingleSubscriber, BoxSubscriber, Cancellable, NoopCancellable, SignalGate,
    SingleSubscriber, Subscriber,
};
use crate::error::StrandError;
use crate::executor::Executor;

/// 每订阅一份的接收方单元：真实订阅者加本次尝试的信号门。
///
/// 发布队列与控制队列的处理闭包都只持有本单元的 `Arc`，
/// 互斥锁保证两条队列的排空在真实订阅者上互不重叠。
pub(crate) struct OffloadCell<R> {
    receiver: Mutex<R>,
    gate: Arc<SignalGate>,
}

impl<R> OffloadCell<R> {
    fn new(receiver: R) -> Arc<Self> {
        Arc::new(Self {
            receiver: Mutex::new(receiver),
            gate: Arc::new(SignalGate::new()),
        })
    }
}

enum StreamSignal<T> {
    Next(T),
    Complete,
    Error(StrandError),
}

enum SingleSignal<T> {
    Success(T),
    Error(StrandError),
}

/// 把流式订阅者包裹为迁移版本。
///
/// # 逻辑解析（How）
/// - 发布类信号（值/完成/错误）经发布队列迁移到发布上下文；
/// - 初始通知经控制队列迁移到控制上下文，取消回执同样绑定控制上下文；
/// - 发布队列初始处于扣押态，控制队列处理完初始通知后才放行——
///   保证初始通知先于一切数据信号被完整处理。
pub(crate) fn offload_stream_receiver<T: Send + 'static>(
    receiver: BoxSubscriber<T>,
    publish_executor: Arc<dyn Executor>,
    control_executor: Arc<dyn Executor>,
) -> BoxSubscriber<T> {
    let cell = OffloadCell::new(receiver);
    let publish = {
        let cell = cell.clone();
        SignalQueue::new_held(
            publish_executor,
            Box::new(move |signal| process_stream_signal(&cell, signal)),
        )
    };
    let control = {
        let cell = cell.clone();
        let publish = publish.clone();
        SignalQueue::new(
            control_executor.clone(),
            Box::new(move |cancellable: BoxCancellable| {
                if !cell.gate.activate() {
                    trace!("duplicate initiation suppressed");
                    return;
                }
                cell.receiver.lock().on_subscribe(cancellable);
                if let Err(rejected) = publish.release() {
                    fail_stream(&cell, &publish, rejected.into());
                }
            }),
        )
    };
    Box::new(OffloadedSubscriber {
        cell,
        publish,
        control,
        control_executor,
    })
}

/// 把单值订阅者包裹为迁移版本；结构与流式版本一致，仅信号形态不同。
pub(crate) fn offload_single_receiver<T: Send + 'static>(
    receiver: BoxSingleSubscriber<T>,
    publish_executor: Arc<dyn Executor>,
    control_executor: Arc<dyn Executor>,
) -> BoxSingleSubscriber<T> {
    let cell = OffloadCell::new(receiver);
    let publish = {
        let cell = cell.clone();
        SignalQueue::new_held(
            publish_executor,
            Box::new(move |signal| process_single_signal(&cell, signal)),
        )
    };
    let control = {
        let cell = cell.clone();
        let publish = publish.clone();
        SignalQueue::new(
            control_executor.clone(),
            Box::new(move |cancellable: BoxCancellable| {
                if !cell.gate.activate() {
                    trace!("duplicate initiation suppressed");
                    return;
                }
                cell.receiver.lock().on_subscribe(cancellable);
                if let Err(rejected) = publish.release() {
                    fail_single(&cell, &publish, rejected.into());
                }
            }),
        )
    };
    Box::new(OffloadedSingleSubscriber {
        cell,
        publish,
        control,
        control_executor,
    })
}

fn process_stream_signal<T: Send + 'static>(
    cell: &Arc<OffloadCell<BoxSubscriber<T>>>,
    signal: StreamSignal<T>,
) {
    match signal {
        StreamSignal::Next(item) => {
            if cell.gate.is_terminal() {
                trace!("value suppressed: subscription already terminal");
                return;
            }
            cell.receiver.lock().on_next(item);
        }
        StreamSignal::Complete => {
            if cell.gate.try_terminate() {
                cell.receiver.lock().on_complete();
            } else {
                trace!("completion suppressed: subscription already terminal");
            }
        }
        StreamSignal::Error(error) => {
            if cell.gate.try_terminate() {
                cell.receiver.lock().on_error(error);
            } else {
                trace!(code = error.code(), "error suppressed: subscription already terminal");
            }
        }
    }
}

fn process_single_signal<T: Send + 'static>(
    cell: &Arc<OffloadCell<BoxSingleSubscriber<T>>>,
    signal: SingleSignal<T>,
) {
    match signal {
        SingleSignal::Success(value) => {
            if cell.gate.try_terminate() {
                cell.receiver.lock().on_success(value);
            } else {
                trace!("success suppressed: subscription already terminal");
            }
        }
        SingleSignal::Error(error) => {
            if cell.gate.try_terminate() {
                cell.receiver.lock().on_error(error);
            } else {
                trace!(code = error.code(), "error suppressed: subscription already terminal");
            }
        }
    }
}

/// 终止一条流式订阅：竞争终止权、清空积压、就地交付错误。
///
/// 仅在"排空任务无法被目标上下文调度"时走到这里；此时该队列必无在跑的
/// 排空任务，互斥锁又与控制队列互斥，就地交付不会与其它信号重叠。
fn fail_stream<T: Send + 'static>(
    cell: &Arc<OffloadCell<BoxSubscriber<T>>>,
    publish: &Arc<SignalQueue<StreamSignal<T>>>,
    error: StrandError,
) {
    if cell.gate.try_terminate() {
        publish.clear();
        cell.receiver.lock().on_error(error);
    } else {
        trace!(code = error.code(), "error suppressed: subscription already terminal");
    }
}

fn fail_single<T: Send + 'static>(
    cell: &Arc<OffloadCell<BoxSingleSubscriber<T>>>,
    publish: &Arc<SignalQueue<SingleSignal<T>>>,
    error: StrandError,
) {
    if cell.gate.try_terminate() {
        publish.clear();
        cell.receiver.lock().on_error(error);
    } else {
        trace!(code = error.code(), "error suppressed: subscription already terminal");
    }
}

struct OffloadedSubscriber<T: Send + 'static> {
    cell: Arc<OffloadCell<BoxSubscriber<T>>>,
    publish: Arc<SignalQueue<StreamSignal<T>>>,
    control: Arc<SignalQueue<BoxCancellable>>,
    control_executor: Arc<dyn Executor>,
}

impl<T: Send + 'static> Subscriber<T> for OffloadedSubscriber<T> {
    fn on_subscribe(&mut self, cancellable: BoxCancellable) {
        let wrapped: BoxCancellable = Box::new(OffloadedCancellable::bound(
            Arc::from(cancellable),
            self.control_executor.clone(),
            Some(self.cell.gate.clone()),
        ));
        if let Err(rejected) = self.control.enqueue(wrapped) {
            // 控制上下文已不可用：初始通知仍必须先于错误就地送达。
            self.control.clear();
            if self.cell.gate.activate() {
                self.cell.receiver.lock().on_subscribe(Box::new(NoopCancellable));
            }
            fail_stream(&self.cell, &self.publish, rejected.into());
        }
    }

    fn on_next(&mut self, item: T) {
        if self.cell.gate.is_terminal() {
            trace!("value dropped: subscription already terminal");
            return;
        }
        if let Err(rejected) = self.publish.enqueue(StreamSignal::Next(item)) {
            fail_stream(&self.cell, &self.publish, rejected.into());
        }
    }

    fn on_complete(&mut self) {
        if let Err(rejected) = self.publish.enqueue(StreamSignal::Complete) {
            fail_stream(&self.cell, &self.publish, rejected.into());
        }
    }

    fn on_error(&mut self, error: StrandError) {
        if let Err(rejected) = self.publish.enqueue(StreamSignal::Error(error)) {
            fail_stream(&self.cell, &self.publish, rejected.into());
        }
    }
}

struct OffloadedSingleSubscriber<T: Send + 'static> {
    cell: Arc<OffloadCell<BoxSingleSubscriber<T>>>,
    publish: Arc<SignalQueue<SingleSignal<T>>>,
    control: Arc<SignalQueue<BoxCancellable>>,
    control_executor: Arc<dyn Executor>,
}

impl<T: Send + 'static> SingleSubscriber<T> for OffloadedSingleSubscriber<T> {
    fn on_subscribe(&mut self, cancellable: BoxCancellable) {
        let wrapped: BoxCancellable = Box::new(OffloadedCancellable::bound(
            Arc::from(cancellable),
            self.control_executor.clone(),
            Some(self.cell.gate.clone()),
        ));
        if let Err(rejected) = self.control.enqueue(wrapped) {
            self.control.clear();
            if self.cell.gate.activate() {
                self.cell.receiver.lock().on_subscribe(Box::new(NoopCancellable));
            }
            fail_single(&self.cell, &self.publish, rejected.into());
        }
    }

    fn on_success(&mut self, value: T) {
        if let Err(rejected) = self.publish.enqueue(SingleSignal::Success(value)) {
            fail_single(&self.cell, &self.publish, rejected.into());
        }
    }

    fn on_error(&mut self, error: StrandError) {
        if let Err(rejected) = self.publish.enqueue(SingleSignal::Error(error)) {
            fail_single(&self.cell, &self.publish, rejected.into());
        }
    }
}

/// 绑定控制上下文的取消回执包装。
///
/// # 契约说明（What）
/// - 携带信号门时，取消先竞争终止权：晚于终止信号到达的取消被抑制，
///   赢得终止权的取消会让后续发布信号被抑制（功能上先到者为准）；
/// - 调用线程已在目标上下文时就地转发（快路径）；
/// - 目标上下文拒绝调度时降级为就地转发——取消信号被送达而非丢弃，
///   只是未能落在期望的上下文上。
pub(crate) struct OffloadedCancellable {
    inner: Arc<dyn Cancellable>,
    executor: Arc<dyn Executor>,
    gate: Option<Arc<SignalGate>>,
}

impl OffloadedCancellable {
    pub(crate) fn bound(
        inner: Arc<dyn Cancellable>,
        executor: Arc<dyn Executor>,
        gate: Option<Arc<SignalGate>>,
    ) -> Self {
        Self {
            inner,
            executor,
            gate,
        }
    }
}

impl Cancellable for OffloadedCancellable {
    fn cancel(&self) {
        if let Some(gate) = &self.gate {
            if !gate.try_terminate() {
                trace!("cancellation ignored: subscription already terminal");
                return;
            }
        }
        if self.executor.is_current_thread_in() {
            self.inner.cancel();
            return;
        }
        let inner = self.inner.clone();
        if let Err(rejected) = self.executor.execute(Box::new(move || inner.cancel())) {
            warn!(
                reason = rejected.reason(),
                "execution context rejected cancellation, delivering inline"
            );
            self.inner.cancel();
        }
    }
}
