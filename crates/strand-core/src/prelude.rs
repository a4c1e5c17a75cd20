//! 常用类型一站式导入面，供调用方 `use strand_core::prelude::*;`。

pub use crate::client::{
    ClientGroup, DefaultClientGroup, GroupKey, KeyedClient, KeyedClientRouter,
    KeyedClientRouterBuilder,
};
pub use crate::concurrent::{
    Attempt, BoxCancellable, BoxCompletion, BoxPublisher, BoxSingle, BoxSingleSubscriber,
    BoxSubscriber, CancelFlag, Cancellable, NoopCancellable, Publisher, SignalGate, Single,
    SingleSubscriber, Subscriber, single,
};
pub use crate::error::{RejectedError, StrandError, codes};
pub use crate::executor::{
    Executor, ExecutorKind, InlineExecutor, MergedOffloadExecutor, OffloadAwareExecutor, Task,
};
pub use crate::offload::{SignalOffloader, offloaded_publisher, offloaded_single};
