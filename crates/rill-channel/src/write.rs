//! 写端通道：本地积累、显式交付。
//!
//! # 模块角色（Why）
//! - 写入永远落在本地的待交付 Packet 上，同步完成、绝不挂起；
//!   只有 [`flush`](ByteWriteChannel::flush) 才进入交接桥并可能等待，
//!   这让“一次 flush 等于一次交付单元”的边界对调用方完全可见。

use alloc::sync::Arc;

use rill_core::{CoreError, Packet, codes};

use crate::bridge::Handoff;

/// 单写者字节通道的写端。
///
/// # 契约说明（What）
/// - **单写者纪律**：任一时刻至多一个 flush 在途，违者得到
///   [`codes::CHANNEL_BUSY`]；
/// - [`close`](ByteWriteChannel::close) 要求本地缓冲已排空，带着未 flush
///   字节关闭是错误（[`codes::CHANNEL_PENDING_BYTES`]）——要么先 flush，
///   要么用 [`flush_and_close`](ByteWriteChannel::flush_and_close)；
/// - 落在终止态通道上的写入 / flush 重复抛出粘性的终止原因；
/// - 未关闭先 Drop 视为异常路径，通道自动按取消处理。
pub struct ByteWriteChannel {
    handoff: Arc<Handoff>,
    writable: Packet,
}

impl ByteWriteChannel {
    pub(crate) fn new(handoff: Arc<Handoff>) -> Self {
        Self {
            handoff,
            writable: Packet::new(),
        }
    }

    fn ensure_open(&self) -> rill_core::Result<(), CoreError> {
        if let Some(cause) = self.handoff.closed_cause() {
            return Err((*cause).clone());
        }
        Ok(())
    }

    /// 尚未交付的本地字节数。
    pub fn pending_bytes(&self) -> usize {
        self.writable.available_for_read()
    }

    /// 本地待交付 Packet 的可变视图，供批量装配场景直接操作。
    pub fn writable_packet(&mut self) -> &mut Packet {
        &mut self.writable
    }

    /// 写入单字节。
    pub fn write_u8(&mut self, value: u8) -> rill_core::Result<(), CoreError> {
        self.ensure_open()?;
        self.writable.write_u8(value)
    }

    /// 写入布尔值。
    pub fn write_bool(&mut self, value: bool) -> rill_core::Result<(), CoreError> {
        self.ensure_open()?;
        self.writable.write_bool(value)
    }

    /// 写入网络字节序 `i16`。
    pub fn write_i16(&mut self, value: i16) -> rill_core::Result<(), CoreError> {
        self.ensure_open()?;
        self.writable.write_i16(value)
    }

    /// 写入网络字节序 `i32`。
    pub fn write_i32(&mut self, value: i32) -> rill_core::Result<(), CoreError> {
        self.ensure_open()?;
        self.writable.write_i32(value)
    }

    /// 写入网络字节序 `i64`。
    pub fn write_i64(&mut self, value: i64) -> rill_core::Result<(), CoreError> {
        self.ensure_open()?;
        self.writable.write_i64(value)
    }

    /// 写入 `f32`。
    pub fn write_f32(&mut self, value: f32) -> rill_core::Result<(), CoreError> {
        self.ensure_open()?;
        self.writable.write_f32(value)
    }

    /// 写入 `f64`。
    pub fn write_f64(&mut self, value: f64) -> rill_core::Result<(), CoreError> {
        self.ensure_open()?;
        self.writable.write_f64(value)
    }

    /// 写入整段切片。
    pub fn write_slice(&mut self, src: &[u8]) -> rill_core::Result<(), CoreError> {
        self.ensure_open()?;
        self.writable.write_slice(src)
    }

    /// UTF-8 写入字符串。
    pub fn write_str(&mut self, text: &str) -> rill_core::Result<(), CoreError> {
        self.ensure_open()?;
        self.writable.write_str(text)
    }

    /// 把整个 Packet 零拷贝并入待交付缓冲。
    pub fn write_packet(&mut self, packet: Packet) -> rill_core::Result<(), CoreError> {
        self.ensure_open()?;
        self.writable.append_packet(packet);
        Ok(())
    }

    /// 交付本地积累的所有字节，直到读端取走才返回。
    ///
    /// # 契约说明（What）
    /// - **后置条件**：成功返回即读端已持有这批字节的所有权，本地缓冲为空；
    /// - 空缓冲 flush 直接成功，不产生空交付单元；
    /// - **错误**：通道带因终止时重复抛出该原因，本批字节作废。
    pub async fn flush(&mut self) -> rill_core::Result<(), CoreError> {
        self.ensure_open()?;
        if self.writable.is_empty() {
            return Ok(());
        }
        let outgoing = self.writable.steal();
        self.handoff.flush(outgoing).await
    }

    /// 关闭写端；要求本地缓冲已排空。幂等。
    pub fn close(&mut self) -> rill_core::Result<(), CoreError> {
        if !self.writable.is_empty() {
            return Err(CoreError::new(
                codes::CHANNEL_PENDING_BYTES,
                alloc::format!(
                    "{} bytes written but not flushed; flush or use flush_and_close",
                    self.writable.available_for_read()
                ),
            ));
        }
        self.handoff.close();
        Ok(())
    }

    /// 先交付剩余字节再关闭。
    pub async fn flush_and_close(&mut self) -> rill_core::Result<(), CoreError> {
        self.flush().await?;
        self.close()
    }

    /// 带原因取消整条通道；`None` 时使用缺省取消原因。幂等。
    pub fn cancel(&mut self, cause: Option<CoreError>) {
        self.writable.close();
        self.handoff.cancel(cause.unwrap_or_else(|| {
            CoreError::new(codes::CHANNEL_CANCELLED, "write channel cancelled")
        }));
    }

    /// 写端是否已终止（干净关闭或取消）。
    pub fn is_closed_for_write(&self) -> bool {
        self.handoff.is_closed()
    }

    /// 终止原因（仅带因取消时非空）。
    pub fn closed_cause(&self) -> Option<CoreError> {
        self.handoff.closed_cause().map(|cause| (*cause).clone())
    }
}

impl Drop for ByteWriteChannel {
    fn drop(&mut self) {
        if !self.handoff.is_closed() {
            self.handoff.cancel(CoreError::new(
                codes::CHANNEL_CANCELLED,
                "write channel dropped before close",
            ));
        }
    }
}
