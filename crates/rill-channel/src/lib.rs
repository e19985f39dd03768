#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![doc = "rill-channel: 基于挂起交接的单读者/单写者字节通道。"]
#![doc = ""]
#![doc = "写端在本地 Packet 上同步积累字节，flush 时经由单槽交接桥把整批"]
#![doc = "所有权移交读端；交接完成前写端保持挂起，形成一个在途单元的天然背压。"]
#![doc = "通道与执行器解耦：所有等待都以标准 `Waker` 表达，组合子返回显式的"]
#![doc = "驱动 Future 交由调用方的执行环境推进。"]

extern crate alloc;

mod bridge;
mod read;
mod transform;
mod write;

pub use read::ByteReadChannel;
pub use write::ByteWriteChannel;

use alloc::sync::Arc;

use bridge::Handoff;

/// 创建一对共享交接桥的读写端。
///
/// # 契约说明（What）
/// - 两端各自独享所有权，天然满足单读者 / 单写者纪律；
/// - 任一端 Drop 而未显式关闭时，通道按取消处理，另一端不会无限挂起。
pub fn byte_channel() -> (ByteWriteChannel, ByteReadChannel) {
    let handoff = Arc::new(Handoff::new());
    (
        ByteWriteChannel::new(handoff.clone()),
        ByteReadChannel::new(handoff),
    )
}
