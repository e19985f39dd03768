use alloc::collections::VecDeque;
use alloc::string::String;
use alloc::vec::Vec;

use crate::charset::Decoder;
use crate::error::{CoreError, codes};

use super::Chunk;

/// 尾部写块的缺省容量。
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// `Packet` 把一串 [`Chunk`] 组成一条可增长、头读尾写的逻辑字节序列。
///
/// # 设计背景（Why）
/// - 通道在挂起点之间搬运的单位就是 Packet：生产方写入尾块，消费方从头部
///   读取并随手丢弃读空的块，整个过程不搬移既有字节；
/// - `available` 缓存所有块的可读字节总和，避免热路径反复求和；其与真实
///   总和的一致性由 `debug_assertions` 下的内部断言守护，而不是每次变更
///   都付出 O(n) 代价。
///
/// # 契约说明（What）
/// - 读取类操作在字节不足时返回 [`codes::END_OF_INPUT`]（流终止语义），
///   与 Chunk 级的越界误用（[`codes::BUFFER_OUT_OF_BOUNDS`]）刻意区分；
/// - 标量写入永不跨块：尾块空间不足时按 `max(DEFAULT_CHUNK_SIZE, 宽度)`
///   重新供块；标量读取则透明跨块拼装；
/// - `Clone` 深拷贝每个块，[`steal`](Packet::steal) 零拷贝转移全部块；
/// - [`close`](Packet::close) 释放所有块且幂等。
#[derive(Debug, Default, Clone)]
pub struct Packet {
    chunks: VecDeque<Chunk>,
    available: usize,
}

impl Packet {
    /// 创建空 Packet。
    pub fn new() -> Self {
        Self::default()
    }

    /// 从切片构造单块 Packet。
    pub fn from_slice(bytes: &[u8]) -> Self {
        let mut packet = Self::new();
        packet.append_chunk(Chunk::from_slice(bytes));
        packet
    }

    /// 当前可读字节总数。
    pub fn available_for_read(&self) -> usize {
        self.available
    }

    /// 是否为空。
    pub fn is_empty(&self) -> bool {
        self.available == 0
    }

    /// 内部一致性断言：`available` 必须等于各块可读字节之和。
    ///
    /// 只在 `debug_assertions` 下编译，违反即为实现缺陷，立即失败。
    #[inline]
    fn debug_assert_consistent(&self) {
        #[cfg(debug_assertions)]
        {
            let total: usize = self.chunks.iter().map(Chunk::available_for_read).sum();
            debug_assert!(
                total == self.available,
                "packet bookkeeping diverged: cached {} vs actual {}",
                self.available,
                total
            );
        }
    }

    fn drop_drained_head(&mut self) {
        while self.chunks.front().is_some_and(Chunk::is_empty) {
            self.chunks.pop_front();
        }
    }

    fn ensure_can_read(&self, count: usize) -> crate::Result<(), CoreError> {
        if count > self.available {
            return Err(CoreError::new(
                codes::END_OF_INPUT,
                alloc::format!("need {count} bytes, only {} available", self.available),
            ));
        }
        Ok(())
    }

    /// 取一个至少能容纳 `width` 字节的尾块。
    fn tail_for(&mut self, width: usize) -> &mut Chunk {
        let needs_fresh = self
            .chunks
            .back()
            .is_none_or(|tail| tail.available_for_write() < width);
        if needs_fresh {
            self.chunks
                .push_back(Chunk::with_capacity(DEFAULT_CHUNK_SIZE.max(width)));
        }
        self.chunks.back_mut().expect("tail chunk just provisioned")
    }

    /// 直接把整块链入尾部，零拷贝；空块直接丢弃。
    pub fn append_chunk(&mut self, chunk: Chunk) {
        if chunk.is_empty() {
            return;
        }
        self.available += chunk.available_for_read();
        self.chunks.push_back(chunk);
        self.debug_assert_consistent();
    }

    /// 把另一 Packet 的所有块按序移入尾部，零拷贝，`other` 被耗尽。
    pub fn append_packet(&mut self, mut other: Packet) {
        self.available += other.available;
        other.available = 0;
        self.chunks.append(&mut other.chunks);
        self.debug_assert_consistent();
    }

    /// 写入单字节。
    pub fn write_u8(&mut self, value: u8) -> crate::Result<(), CoreError> {
        self.tail_for(1).write_u8(value)?;
        self.available += 1;
        self.debug_assert_consistent();
        Ok(())
    }

    /// 写入布尔值。
    pub fn write_bool(&mut self, value: bool) -> crate::Result<(), CoreError> {
        self.write_u8(if value { 1 } else { 0 })
    }

    /// 写入网络字节序 `i16`。
    pub fn write_i16(&mut self, value: i16) -> crate::Result<(), CoreError> {
        self.tail_for(2).write_i16(value)?;
        self.available += 2;
        self.debug_assert_consistent();
        Ok(())
    }

    /// 写入网络字节序 `i32`。
    pub fn write_i32(&mut self, value: i32) -> crate::Result<(), CoreError> {
        self.tail_for(4).write_i32(value)?;
        self.available += 4;
        self.debug_assert_consistent();
        Ok(())
    }

    /// 写入网络字节序 `i64`。
    pub fn write_i64(&mut self, value: i64) -> crate::Result<(), CoreError> {
        self.tail_for(8).write_i64(value)?;
        self.available += 8;
        self.debug_assert_consistent();
        Ok(())
    }

    /// 写入 `f32`（按 `i32` 位模式）。
    pub fn write_f32(&mut self, value: f32) -> crate::Result<(), CoreError> {
        self.write_i32(value.to_bits() as i32)
    }

    /// 写入 `f64`（按 `i64` 位模式）。
    pub fn write_f64(&mut self, value: f64) -> crate::Result<(), CoreError> {
        self.write_i64(value.to_bits() as i64)
    }

    /// 写入整段切片，按尾块剩余空间分段落盘。
    pub fn write_slice(&mut self, mut src: &[u8]) -> crate::Result<(), CoreError> {
        while !src.is_empty() {
            let tail = self.tail_for(1);
            let take = tail.available_for_write().min(src.len());
            tail.write_slice(&src[..take])?;
            self.available += take;
            src = &src[take..];
        }
        self.debug_assert_consistent();
        Ok(())
    }

    /// UTF-8 快路径写入字符串。
    pub fn write_str(&mut self, text: &str) -> crate::Result<(), CoreError> {
        self.write_slice(text.as_bytes())
    }

    /// 读取单字节。
    pub fn read_u8(&mut self) -> crate::Result<u8, CoreError> {
        self.ensure_can_read(1)?;
        let head = self.chunks.front_mut().expect("non-empty packet has a head");
        let value = head.read_u8()?;
        self.available -= 1;
        self.drop_drained_head();
        self.debug_assert_consistent();
        Ok(value)
    }

    /// 读取布尔值：非零即真。
    pub fn read_bool(&mut self) -> crate::Result<bool, CoreError> {
        Ok(self.read_u8()? != 0)
    }

    /// 跨块拼装定长整数的通用路径。
    fn read_array<const N: usize>(&mut self) -> crate::Result<[u8; N], CoreError> {
        self.ensure_can_read(N)?;
        let mut bytes = [0u8; N];
        for slot in &mut bytes {
            *slot = self.read_u8()?;
        }
        Ok(bytes)
    }

    /// 读取网络字节序 `i16`，透明跨块。
    pub fn read_i16(&mut self) -> crate::Result<i16, CoreError> {
        Ok(i16::from_be_bytes(self.read_array::<2>()?))
    }

    /// 读取网络字节序 `i32`，透明跨块。
    pub fn read_i32(&mut self) -> crate::Result<i32, CoreError> {
        Ok(i32::from_be_bytes(self.read_array::<4>()?))
    }

    /// 读取网络字节序 `i64`，透明跨块。
    pub fn read_i64(&mut self) -> crate::Result<i64, CoreError> {
        Ok(i64::from_be_bytes(self.read_array::<8>()?))
    }

    /// 读取 `f32`（`i32` 位模式重解释）。
    pub fn read_f32(&mut self) -> crate::Result<f32, CoreError> {
        Ok(f32::from_bits(self.read_i32()? as u32))
    }

    /// 读取 `f64`（`i64` 位模式重解释）。
    pub fn read_f64(&mut self) -> crate::Result<f64, CoreError> {
        Ok(f64::from_bits(self.read_i64()? as u64))
    }

    /// 读出 `count` 字节为独立数组，跨块拷贝。
    pub fn read_byte_array(&mut self, count: usize) -> crate::Result<Vec<u8>, CoreError> {
        self.ensure_can_read(count)?;
        let mut result = Vec::with_capacity(count);
        let mut remaining = count;
        while remaining > 0 {
            let head = self.chunks.front_mut().expect("bytes ensured above");
            let take = head.available_for_read().min(remaining);
            result.extend_from_slice(&head.read_byte_array(take)?);
            self.available -= take;
            remaining -= take;
            self.drop_drained_head();
        }
        self.debug_assert_consistent();
        Ok(result)
    }

    /// 读出前 `count` 字节为新的 Packet。
    ///
    /// 整块命中时直接转移所有权；只有跨越边界的那一块需要拷贝切分。
    pub fn read_packet(&mut self, count: usize) -> crate::Result<Packet, CoreError> {
        self.ensure_can_read(count)?;
        let mut result = Packet::new();
        let mut remaining = count;
        while remaining > 0 {
            let head_len = self
                .chunks
                .front()
                .map(Chunk::available_for_read)
                .expect("bytes ensured above");
            if head_len <= remaining {
                let chunk = self.chunks.pop_front().expect("head exists");
                self.available -= head_len;
                remaining -= head_len;
                result.append_chunk(chunk);
            } else {
                let head = self.chunks.front_mut().expect("head exists");
                let chunk = head.read_chunk(remaining)?;
                self.available -= remaining;
                remaining = 0;
                result.append_chunk(chunk);
            }
        }
        self.debug_assert_consistent();
        Ok(result)
    }

    /// 暴露头块视图，不消费。
    pub fn peek(&self) -> Option<&Chunk> {
        self.chunks.front()
    }

    /// 弹出头块，转移所有权。
    pub fn read_chunk(&mut self) -> Option<Chunk> {
        let chunk = self.chunks.pop_front()?;
        self.available -= chunk.available_for_read();
        self.debug_assert_consistent();
        Some(chunk)
    }

    /// 自当前读位置查找 `needle` 首次连续出现的偏移。
    ///
    /// # 逻辑解析（How）
    /// - 以（块下标，块内偏移）双游标表示候选起点，逐字节后移；每个候选
    ///   起点向前跨块比对整个 `needle`。候选起点必须覆盖块边界两侧的任意
    ///   位置，包括落在上一块尾部、与前一候选的部分匹配区重叠的起点；
    /// - 空 `needle` 恒在偏移 0 命中。
    ///
    /// # 权衡（Trade-offs）
    /// - 最坏 O(n·m)；needle 在本系统中是分隔符级别的 1~2 字节，可接受。
    pub fn index_of(&self, needle: &[u8]) -> Option<usize> {
        if needle.is_empty() {
            return Some(0);
        }
        if needle.len() > self.available {
            return None;
        }

        let slices: Vec<&[u8]> = self.chunks.iter().map(Chunk::readable).collect();
        let mut start_chunk = 0usize;
        let mut start_offset = 0usize;
        for index in 0..=self.available - needle.len() {
            let mut chunk = start_chunk;
            let mut offset = start_offset;
            let mut matched = true;
            for &expected in needle {
                while offset == slices[chunk].len() {
                    chunk += 1;
                    offset = 0;
                }
                if slices[chunk][offset] != expected {
                    matched = false;
                    break;
                }
                offset += 1;
            }
            if matched {
                return Some(index);
            }
            start_offset += 1;
            while start_chunk < slices.len() && start_offset >= slices[start_chunk].len() {
                start_chunk += 1;
                start_offset = 0;
            }
        }

        None
    }

    /// 丢弃至多 `limit` 字节，返回实际丢弃数。
    ///
    /// `limit >= available_for_read` 时等价于 [`close`](Packet::close)，
    /// 返回关闭前的可读字节数。
    pub fn discard(&mut self, limit: usize) -> usize {
        if limit >= self.available {
            let dropped = self.available;
            self.close();
            return dropped;
        }

        let mut remaining = limit;
        while remaining > 0 {
            let head = self.chunks.front_mut().expect("limit below available");
            let dropped = head.discard(remaining);
            remaining -= dropped;
            self.drop_drained_head();
        }
        self.available -= limit;
        self.debug_assert_consistent();
        limit
    }

    /// 精确丢弃 `count` 字节；不足时返回 [`codes::END_OF_INPUT`] 且内容原样保留。
    pub fn discard_exact(&mut self, count: usize) -> crate::Result<(), CoreError> {
        self.ensure_can_read(count)?;
        self.discard(count);
        Ok(())
    }

    /// 把全部块转移进新 Packet，零拷贝，源变为空。
    pub fn steal(&mut self) -> Packet {
        core::mem::take(self)
    }

    /// 排空剩余内容为字节数组。
    pub fn to_byte_array(&mut self) -> Vec<u8> {
        let mut result = Vec::with_capacity(self.available);
        for chunk in &mut self.chunks {
            result.extend_from_slice(&chunk.to_vec());
        }
        self.chunks.clear();
        self.available = 0;
        result
    }

    /// 按 UTF-8 排空并解码全部内容。
    pub fn read_string(&mut self) -> crate::Result<String, CoreError> {
        String::from_utf8(self.to_byte_array()).map_err(|err| {
            CoreError::new(codes::TEXT_MALFORMED, "packet content is not valid UTF-8")
                .with_cause(err)
        })
    }

    /// 通过字符集协作方排空并解码全部内容（非 UTF-8 场景）。
    pub fn read_text_with(&mut self, decoder: &mut dyn Decoder) -> crate::Result<String, CoreError> {
        let mut result = String::new();
        while let Some(mut chunk) = self.read_chunk() {
            result.push_str(&decoder.decode(&chunk.to_vec())?);
        }
        result.push_str(&decoder.flush()?);
        Ok(result)
    }

    /// 释放所有块；幂等。
    pub fn close(&mut self) {
        self.chunks.clear();
        self.available = 0;
    }
}

/// 与 `bytes` 生态的只读互操作：Packet 即一条分段的 `Buf`。
impl bytes::Buf for Packet {
    fn remaining(&self) -> usize {
        self.available
    }

    fn chunk(&self) -> &[u8] {
        self.chunks.front().map_or(&[], Chunk::readable)
    }

    fn advance(&mut self, cnt: usize) {
        // Buf 契约允许对越界推进直接断言失败。
        assert!(
            cnt <= self.available,
            "advance {cnt} beyond {} readable bytes",
            self.available
        );
        self.discard(cnt);
    }
}
