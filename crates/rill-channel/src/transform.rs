//! 通道组合子：拷贝、截断、分流、逐包变换。
//!
//! # 模块角色（Why）
//! - 组合子不自带执行器：每个变换返回“新通道 + 驱动 Future”，由调用方
//!   决定在哪个执行环境里推进驱动，核心层保持运行时无关；
//! - 失败传播靠取消：驱动中任何一跳出错，错误原因被取消到所有下游，
//!   读到一半的消费者看到的是同一个根因而不是凭空的 EOF。

use core::future::Future;

use rill_core::{CoreError, Packet};

use crate::read::ByteReadChannel;
use crate::write::ByteWriteChannel;
use crate::byte_channel;

impl ByteReadChannel {
    /// 把至多 `limit` 字节搬运到 `target`，返回实际搬运数。
    ///
    /// # 逻辑解析（How）
    /// - 每等到一批字节就立刻交付一批，不做聚合：上游的交付边界
    ///   尽量原样透传，搬运本身不引入额外时延；
    /// - 整批命中时零拷贝转移本地缓冲，只有跨越 `limit` 的最后一批
    ///   需要切分。
    pub async fn copy_to(
        &mut self,
        target: &mut ByteWriteChannel,
        limit: u64,
    ) -> rill_core::Result<u64, CoreError> {
        let mut copied = 0u64;
        while copied < limit {
            if !self.await_bytes().await? {
                break;
            }
            let available = self.available_for_read() as u64;
            let take = available.min(limit - copied);
            let batch = if take == available {
                self.steal_readable()
            } else {
                self.read_packet(take as usize).await?
            };
            target.write_packet(batch)?;
            target.flush().await?;
            copied += take;
        }
        Ok(copied)
    }

    /// 截断视图：最多透传 `limit` 字节，之后下游看到干净 EOF。
    ///
    /// 返回新的读端与驱动 Future；驱动完成前上游未被读完的部分保持原状。
    pub fn limited(
        mut self,
        limit: u64,
    ) -> (
        ByteReadChannel,
        impl Future<Output = rill_core::Result<(), CoreError>>,
    ) {
        let (mut writer, reader) = byte_channel();
        let driver = async move {
            let outcome = self.copy_to(&mut writer, limit).await;
            match outcome {
                Ok(_) => writer.flush_and_close().await,
                Err(err) => {
                    writer.cancel(Some(err.clone()));
                    Err(err)
                }
            }
        };
        (reader, driver)
    }

    /// 分流：同一字节流复制给两个独立的下游读端。
    ///
    /// 任一下游被取消都会把原因回传到上游与另一下游。
    pub fn split(
        mut self,
    ) -> (
        ByteReadChannel,
        ByteReadChannel,
        impl Future<Output = rill_core::Result<(), CoreError>>,
    ) {
        let (mut left_writer, left_reader) = byte_channel();
        let (mut right_writer, right_reader) = byte_channel();
        let driver = async move {
            loop {
                match self.next_packet().await {
                    Ok(Some(packet)) => {
                        let duplicate = packet.clone();
                        if let Err(err) = deliver(&mut left_writer, packet).await {
                            right_writer.cancel(Some(err.clone()));
                            self.cancel(Some(err.clone()));
                            return Err(err);
                        }
                        if let Err(err) = deliver(&mut right_writer, duplicate).await {
                            left_writer.cancel(Some(err.clone()));
                            self.cancel(Some(err.clone()));
                            return Err(err);
                        }
                    }
                    Ok(None) => {
                        left_writer.flush_and_close().await?;
                        right_writer.flush_and_close().await?;
                        return Ok(());
                    }
                    Err(err) => {
                        left_writer.cancel(Some(err.clone()));
                        right_writer.cancel(Some(err.clone()));
                        return Err(err);
                    }
                }
            }
        };
        (left_reader, right_reader, driver)
    }

    /// 逐交付单元变换读取流。
    ///
    /// `transform` 对每个交付单元执行，其错误会取消下游并终止驱动。
    pub fn map_read(
        mut self,
        mut transform: impl FnMut(Packet) -> rill_core::Result<Packet, CoreError>,
    ) -> (
        ByteReadChannel,
        impl Future<Output = rill_core::Result<(), CoreError>>,
    ) {
        let (mut writer, reader) = byte_channel();
        let driver = async move {
            loop {
                match self.next_packet().await {
                    Ok(Some(packet)) => {
                        let mapped = match transform(packet) {
                            Ok(mapped) => mapped,
                            Err(err) => {
                                writer.cancel(Some(err.clone()));
                                self.cancel(Some(err.clone()));
                                return Err(err);
                            }
                        };
                        if let Err(err) = deliver(&mut writer, mapped).await {
                            self.cancel(Some(err.clone()));
                            return Err(err);
                        }
                    }
                    Ok(None) => return writer.flush_and_close().await,
                    Err(err) => {
                        writer.cancel(Some(err.clone()));
                        return Err(err);
                    }
                }
            }
        };
        (reader, driver)
    }
}

impl ByteWriteChannel {
    /// 逐交付单元变换写入流：返回的新写端接收原始字节，驱动把变换后的
    /// 字节送入 `self`。
    pub fn map_write(
        mut self,
        mut transform: impl FnMut(Packet) -> rill_core::Result<Packet, CoreError>,
    ) -> (
        ByteWriteChannel,
        impl Future<Output = rill_core::Result<(), CoreError>>,
    ) {
        let (writer, mut reader) = byte_channel();
        let driver = async move {
            loop {
                match reader.next_packet().await {
                    Ok(Some(packet)) => {
                        let mapped = match transform(packet) {
                            Ok(mapped) => mapped,
                            Err(err) => {
                                self.cancel(Some(err.clone()));
                                reader.cancel(Some(err.clone()));
                                return Err(err);
                            }
                        };
                        if let Err(err) = deliver(&mut self, mapped).await {
                            reader.cancel(Some(err.clone()));
                            return Err(err);
                        }
                    }
                    Ok(None) => return self.flush_and_close().await,
                    Err(err) => {
                        self.cancel(Some(err.clone()));
                        return Err(err);
                    }
                }
            }
        };
        (writer, driver)
    }
}

/// 单批交付：并入待交付缓冲并立刻 flush，空批直接跳过。
async fn deliver(
    writer: &mut ByteWriteChannel,
    packet: Packet,
) -> rill_core::Result<(), CoreError> {
    if packet.is_empty() {
        return Ok(());
    }
    writer.write_packet(packet)?;
    writer.flush().await
}
