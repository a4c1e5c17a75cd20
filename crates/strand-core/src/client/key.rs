use std::fmt;

/// 未解析网络目的地的不透明标识，地址类型为 `A`。
///
/// # 契约说明（What）
/// - 相等且哈希一致的两个键必须可由同一个池化客户端服务；
/// - 键本身不承载解析结果，解析与连接建立是成员客户端的职责；
/// - 键由请求经纯函数推导而来，推导失败走异步错误通道（见路由门面）。
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct GroupKey<A> {
    address: A,
}

impl<A> GroupKey<A> {
    /// 以目的地址构造键。
    pub fn new(address: A) -> Self {
        Self { address }
    }

    /// 借出目的地址。
    pub fn address(&self) -> &A {
        &self.address
    }

    /// 取回目的地址所有权。
    pub fn into_address(self) -> A {
        self.address
    }
}

impl<A: fmt::Debug> fmt::Debug for GroupKey<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GroupKey").field(&self.address).finish()
    }
}
