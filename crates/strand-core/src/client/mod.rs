//! # 按键路由模块
//!
//! ## 角色定位（Why）
//! - 把"按目的地分桶的一群客户端"收拢在单一逻辑门面之后：每个请求经
//!   纯函数推导出目的键，由组解析（或惰性创建）对应的成员客户端服务；
//! - 生命周期（关闭、优雅关闭）沿门面 → 组 → 成员逐层传播，
//!   "整组已关闭"以聚合完成信号对外广播。
//!
//! ## 模块结构
//! * `key`：不透明的目的键 [`GroupKey`]；
//! * `group`：成员客户端契约 [`KeyedClient`]、组契约 [`ClientGroup`] 与
//!   内置实现 [`DefaultClientGroup`]；
//! * `router`：路由门面 [`KeyedClientRouter`]。
//!
//! ## 错误路径（What）
//! - 键推导失败、组已关闭、下游故障三者均经异步错误信号送达；
//! - 下游错误原样透传，键推导的失败在送达前先交付初始通知。

mod group;
mod key;
mod router;

pub use group::{ClientGroup, DefaultClientGroup, KeyedClient};
pub use key::GroupKey;
pub use router::{KeyedClientRouter, KeyedClientRouterBuilder};
