//! 链式缓冲模型：固定容量的 [`Chunk`] 与由其串联而成的 [`Packet`]。
//!
//! # 模块角色（Why）
//! - `Chunk` 是最小的编解码单元：双游标、定容、越界即错；
//! - `Packet` 把若干 Chunk 当作一条可增长、头读尾写的逻辑字节序列，
//!   是通道在挂起点之间搬运数据的单位。
//!
//! # 契约速记（What）
//! - 所有读写越界都同步返回 [`codes::BUFFER_OUT_OF_BOUNDS`]（Packet 级
//!   的“字节不够”则是 [`codes::END_OF_INPUT`]），绝不挂起；
//! - 两个类型的 `Clone` 一律是独立深拷贝，不存在共享存储的别名模式。
//!
//! [`codes::BUFFER_OUT_OF_BOUNDS`]: crate::error::codes::BUFFER_OUT_OF_BOUNDS
//! [`codes::END_OF_INPUT`]: crate::error::codes::END_OF_INPUT

mod chunk;
mod packet;

pub use chunk::Chunk;
pub use packet::{DEFAULT_CHUNK_SIZE, Packet};
