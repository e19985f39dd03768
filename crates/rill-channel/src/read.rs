//! 读端通道：按需等待、本地排空。
//!
//! # 模块角色（Why）
//! - 读端维护一个本地可读 Packet：交接桥送来的每批字节先并入本地，
//!   再由各读取原语同步消费；只有本地字节不够时才回到桥上挂起；
//! - 所有定长读取共享同一条“凑齐或终止”路径：流在凑齐之前干净终止
//!   即为 [`codes::END_OF_INPUT`]，带因终止则重复抛出该原因。

use alloc::sync::Arc;
use alloc::vec::Vec;

use rill_core::{CoreError, Packet, codes};

use crate::bridge::Handoff;

/// 单读者字节通道的读端。
///
/// # 契约说明（What）
/// - **单读者纪律**：任一时刻至多一个读取在桥上等待，违者得到
///   [`codes::CHANNEL_BUSY`]；
/// - 未显式取消先 Drop 时，通道自动按取消处理，放行可能在等待的写端。
pub struct ByteReadChannel {
    handoff: Arc<Handoff>,
    readable: Packet,
}

impl ByteReadChannel {
    pub(crate) fn new(handoff: Arc<Handoff>) -> Self {
        Self {
            handoff,
            readable: Packet::new(),
        }
    }

    /// 从内存 Packet 构造已终止的读端：内容可照常读取，读完即 EOF。
    pub fn from_packet(packet: Packet) -> Self {
        Self {
            handoff: Arc::new(Handoff::preloaded(Some(packet))),
            readable: Packet::new(),
        }
    }

    /// 构造空的已终止读端。
    pub fn empty() -> Self {
        Self {
            handoff: Arc::new(Handoff::preloaded(None)),
            readable: Packet::new(),
        }
    }

    /// 本地立即可读的字节数（不含写端尚未交付的部分）。
    pub fn available_for_read(&self) -> usize {
        self.readable.available_for_read()
    }

    /// 本地可读 Packet 的视图，供窥探场景使用。
    pub fn readable_packet(&self) -> &Packet {
        &self.readable
    }

    /// 只要 `keep_waiting` 对当前本地缓冲返回 `true` 就继续等待新交付。
    ///
    /// # 契约说明（What）
    /// - 返回 `Ok(true)`：谓词已不成立，本地缓冲满足条件；
    /// - 返回 `Ok(false)`：流在谓词满足前干净终止；
    /// - **错误**：带因终止原样透传，本地缓冲作废。
    pub async fn await_bytes_while(
        &mut self,
        mut keep_waiting: impl FnMut(&Packet) -> bool,
    ) -> rill_core::Result<bool, CoreError> {
        loop {
            if !keep_waiting(&self.readable) {
                return Ok(true);
            }
            match self.handoff.consume().await {
                Ok(Some(delivered)) => self.readable.append_packet(delivered),
                Ok(None) => return Ok(false),
                Err(err) => {
                    self.readable.close();
                    return Err(err);
                }
            }
        }
    }

    /// 等待至少一个字节可读；`Ok(false)` 表示流已终止且无剩余字节。
    pub async fn await_bytes(&mut self) -> rill_core::Result<bool, CoreError> {
        self.await_bytes_while(Packet::is_empty).await
    }

    /// 凑齐 `count` 字节，凑不齐即 [`codes::END_OF_INPUT`]。
    async fn ensure_available(&mut self, count: usize) -> rill_core::Result<(), CoreError> {
        let satisfied = self
            .await_bytes_while(|readable| readable.available_for_read() < count)
            .await?;
        if !satisfied {
            return Err(CoreError::new(
                codes::END_OF_INPUT,
                alloc::format!(
                    "stream closed with {} of {count} bytes available",
                    self.readable.available_for_read()
                ),
            ));
        }
        Ok(())
    }

    /// 读取单字节。
    pub async fn read_u8(&mut self) -> rill_core::Result<u8, CoreError> {
        self.ensure_available(1).await?;
        self.readable.read_u8()
    }

    /// 读取布尔值。
    pub async fn read_bool(&mut self) -> rill_core::Result<bool, CoreError> {
        self.ensure_available(1).await?;
        self.readable.read_bool()
    }

    /// 读取网络字节序 `i16`。
    pub async fn read_i16(&mut self) -> rill_core::Result<i16, CoreError> {
        self.ensure_available(2).await?;
        self.readable.read_i16()
    }

    /// 读取网络字节序 `i32`。
    pub async fn read_i32(&mut self) -> rill_core::Result<i32, CoreError> {
        self.ensure_available(4).await?;
        self.readable.read_i32()
    }

    /// 读取网络字节序 `i64`。
    pub async fn read_i64(&mut self) -> rill_core::Result<i64, CoreError> {
        self.ensure_available(8).await?;
        self.readable.read_i64()
    }

    /// 读取 `f32`。
    pub async fn read_f32(&mut self) -> rill_core::Result<f32, CoreError> {
        self.ensure_available(4).await?;
        self.readable.read_f32()
    }

    /// 读取 `f64`。
    pub async fn read_f64(&mut self) -> rill_core::Result<f64, CoreError> {
        self.ensure_available(8).await?;
        self.readable.read_f64()
    }

    /// 读出 `count` 字节为独立数组。
    pub async fn read_byte_array(
        &mut self,
        count: usize,
    ) -> rill_core::Result<Vec<u8>, CoreError> {
        self.ensure_available(count).await?;
        self.readable.read_byte_array(count)
    }

    /// 读出前 `count` 字节为新 Packet。
    pub async fn read_packet(&mut self, count: usize) -> rill_core::Result<Packet, CoreError> {
        self.ensure_available(count).await?;
        self.readable.read_packet(count)
    }

    /// 丢弃至多 `limit` 字节，必要时等待新交付，返回实际丢弃数。
    ///
    /// 流在丢够之前终止不是错误，返回值会小于 `limit`。
    pub async fn discard(&mut self, limit: u64) -> rill_core::Result<u64, CoreError> {
        let mut dropped = 0u64;
        while dropped < limit {
            if !self.await_bytes().await? {
                break;
            }
            let take = (self.readable.available_for_read() as u64).min(limit - dropped);
            self.readable.discard(take as usize);
            dropped += take;
        }
        Ok(dropped)
    }

    /// 读出直到流终止的全部剩余字节。
    pub async fn read_remaining(&mut self) -> rill_core::Result<Packet, CoreError> {
        self.await_bytes_while(|_| true).await.map(|_| ())?;
        Ok(self.readable.steal())
    }

    /// 取走下一批字节：先清空本地缓冲，再等下一次交付。
    ///
    /// 交付单元的边界与写端的 flush 一一对应（本地缓冲非空时先原样
    /// 返还本地缓冲）。`Ok(None)` 表示流已干净终止。
    pub async fn next_packet(&mut self) -> rill_core::Result<Option<Packet>, CoreError> {
        if !self.readable.is_empty() {
            return Ok(Some(self.readable.steal()));
        }
        self.handoff.consume().await
    }

    /// 零拷贝转移本地缓冲，桥上的后续交付不受影响。
    pub(crate) fn steal_readable(&mut self) -> Packet {
        self.readable.steal()
    }

    /// 带原因取消整条通道；`None` 时使用缺省取消原因。幂等。
    pub fn cancel(&mut self, cause: Option<CoreError>) {
        self.readable.close();
        self.handoff.cancel(cause.unwrap_or_else(|| {
            CoreError::new(codes::CHANNEL_CANCELLED, "read channel cancelled")
        }));
    }

    /// 读端是否已彻底结束：流终止且本地与桥上均无剩余字节。
    pub fn is_closed_for_read(&self) -> bool {
        self.readable.is_empty() && self.handoff.is_drained()
    }

    /// 终止原因（仅带因取消时非空）。
    pub fn closed_cause(&self) -> Option<CoreError> {
        self.handoff.closed_cause().map(|cause| (*cause).clone())
    }
}

impl Drop for ByteReadChannel {
    fn drop(&mut self) {
        if !self.handoff.is_closed() {
            self.handoff.cancel(CoreError::new(
                codes::CHANNEL_CANCELLED,
                "read channel dropped before the stream terminated",
            ));
        }
    }
}
