#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![doc = "rill-core: 传输无关的内存字节序列核心。"]
#![doc = ""]
#![doc = "提供固定容量缓冲（[`Chunk`]）、由缓冲链构成的可增长字节序列（[`Packet`]）、"]
#![doc = "借出/回收纪律的对象池（[`pool`]）以及字符集解码协作方契约（[`charset`]）。"]
#![doc = "本 crate 不定义任何线格式：Packet 只是被上层消费的内存表示。"]

extern crate alloc;

pub mod buffer;
pub mod charset;
pub mod error;
pub mod pool;

pub use buffer::{Chunk, DEFAULT_CHUNK_SIZE, Packet};
pub use error::{CoreError, codes};

/// 统一的结果别名，错误参数显式书写以保持契约可读。
pub type Result<T, E> = core::result::Result<T, E>;
