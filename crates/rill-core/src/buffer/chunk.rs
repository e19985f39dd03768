use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;

use crate::error::{CoreError, codes};

/// `Chunk` 是固定容量的字节区域，持有相互独立的读写游标。
///
/// # 设计背景（Why）
/// - Packet 需要一个边界清晰的最小单元：容量在构造时锁死，游标满足
///   `0 <= read_index <= write_index <= capacity`，任何越界访问立即失败；
/// - 多字节整数按网络字节序写入，由两个半宽值组成（高半部在前）；
///   小端互操作使用整数类型自带的 `swap_bytes`，不另设转换模块。
///
/// # 契约说明（What）
/// - `get_at`/`set_at` 系列按绝对下标访问，不移动游标；`read_*`/`write_*`
///   移动游标并对 `available_for_read`/`available_for_write` 做边界检查，
///   失败返回 [`codes::BUFFER_OUT_OF_BOUNDS`]——这是编程错误信号，不是挂起点；
/// - **Clone 契约**：`Clone` 恒为独立深拷贝。原型系统中存在“共享存储、
///   游标独立”的别名克隆，本实现刻意不提供该模式，以消除整类别名缺陷；
/// - [`Chunk::empty`] 返回零容量哨兵，任何写入都会失败，作为“空结果”的
///   规范表达。
#[derive(Debug, Clone)]
pub struct Chunk {
    storage: Box<[u8]>,
    read_index: usize,
    write_index: usize,
}

impl Chunk {
    /// 以给定容量创建空缓冲，存储清零。
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            read_index: 0,
            write_index: 0,
        }
    }

    /// 从切片构造已填充的缓冲：容量与长度相同，整段可读。
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            storage: bytes.into(),
            read_index: 0,
            write_index: bytes.len(),
        }
    }

    /// 零容量哨兵缓冲。
    pub fn empty() -> Self {
        Self::with_capacity(0)
    }

    /// 固定容量。
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// 当前读游标。
    pub fn read_index(&self) -> usize {
        self.read_index
    }

    /// 当前写游标。
    pub fn write_index(&self) -> usize {
        self.write_index
    }

    /// 可读字节数。
    pub fn available_for_read(&self) -> usize {
        self.write_index - self.read_index
    }

    /// 剩余可写空间。
    pub fn available_for_write(&self) -> usize {
        self.capacity() - self.write_index
    }

    /// 是否已读空。
    pub fn is_empty(&self) -> bool {
        self.available_for_read() == 0
    }

    /// 当前可读区段的切片视图。
    pub fn readable(&self) -> &[u8] {
        &self.storage[self.read_index..self.write_index]
    }

    fn ensure_can_read(&self, count: usize) -> crate::Result<(), CoreError> {
        if count > self.available_for_read() {
            return Err(CoreError::new(
                codes::BUFFER_OUT_OF_BOUNDS,
                alloc::format!(
                    "read of {count} bytes exceeds {} available",
                    self.available_for_read()
                ),
            ));
        }
        Ok(())
    }

    fn ensure_can_write(&self, count: usize) -> crate::Result<(), CoreError> {
        if count > self.available_for_write() {
            return Err(CoreError::new(
                codes::BUFFER_OUT_OF_BOUNDS,
                alloc::format!(
                    "write of {count} bytes exceeds {} available",
                    self.available_for_write()
                ),
            ));
        }
        Ok(())
    }

    fn ensure_in_capacity(&self, index: usize, width: usize) -> crate::Result<(), CoreError> {
        if index.checked_add(width).is_none_or(|end| end > self.capacity()) {
            return Err(CoreError::new(
                codes::BUFFER_OUT_OF_BOUNDS,
                alloc::format!("index {index}+{width} exceeds capacity {}", self.capacity()),
            ));
        }
        Ok(())
    }

    /// 读取绝对下标处的字节，不移动游标。
    pub fn get_at(&self, index: usize) -> crate::Result<u8, CoreError> {
        self.ensure_in_capacity(index, 1)?;
        Ok(self.storage[index])
    }

    /// 写入绝对下标处的字节，不移动游标。
    pub fn set_at(&mut self, index: usize, value: u8) -> crate::Result<(), CoreError> {
        self.ensure_in_capacity(index, 1)?;
        self.storage[index] = value;
        Ok(())
    }

    /// 按网络字节序在绝对下标写入 `i16`：高字节在前。
    pub fn set_i16_at(&mut self, index: usize, value: i16) -> crate::Result<(), CoreError> {
        self.ensure_in_capacity(index, 2)?;
        self.set_at(index, (value >> 8) as u8)?;
        self.set_at(index + 1, value as u8)
    }

    /// 按网络字节序在绝对下标写入 `i32`：高半字在前。
    pub fn set_i32_at(&mut self, index: usize, value: i32) -> crate::Result<(), CoreError> {
        self.ensure_in_capacity(index, 4)?;
        self.set_i16_at(index, (value >> 16) as i16)?;
        self.set_i16_at(index + 2, value as i16)
    }

    /// 按网络字节序在绝对下标写入 `i64`：高半部在前。
    pub fn set_i64_at(&mut self, index: usize, value: i64) -> crate::Result<(), CoreError> {
        self.ensure_in_capacity(index, 8)?;
        self.set_i32_at(index, (value >> 32) as i32)?;
        self.set_i32_at(index + 4, value as i32)
    }

    /// 读取单字节并推进读游标。
    pub fn read_u8(&mut self) -> crate::Result<u8, CoreError> {
        self.ensure_can_read(1)?;
        let value = self.storage[self.read_index];
        self.read_index += 1;
        Ok(value)
    }

    /// 读取布尔值：非零即真。
    pub fn read_bool(&mut self) -> crate::Result<bool, CoreError> {
        Ok(self.read_u8()? != 0)
    }

    /// 读取网络字节序 `i16`。
    pub fn read_i16(&mut self) -> crate::Result<i16, CoreError> {
        self.ensure_can_read(2)?;
        let high = self.read_u8()? as i16;
        let low = self.read_u8()? as i16;
        Ok((high << 8) | (low & 0xff))
    }

    /// 读取网络字节序 `i32`。
    pub fn read_i32(&mut self) -> crate::Result<i32, CoreError> {
        self.ensure_can_read(4)?;
        let high = self.read_i16()? as i32;
        let low = self.read_i16()? as i32;
        Ok((high << 16) | (low & 0xffff))
    }

    /// 读取网络字节序 `i64`。
    pub fn read_i64(&mut self) -> crate::Result<i64, CoreError> {
        self.ensure_can_read(8)?;
        let high = self.read_i32()? as i64;
        let low = self.read_i32()? as i64;
        Ok((high << 32) | (low & 0xffff_ffff))
    }

    /// 读取 `f32`，由 `i32` 位模式重解释。
    pub fn read_f32(&mut self) -> crate::Result<f32, CoreError> {
        Ok(f32::from_bits(self.read_i32()? as u32))
    }

    /// 读取 `f64`，由 `i64` 位模式重解释。
    pub fn read_f64(&mut self) -> crate::Result<f64, CoreError> {
        Ok(f64::from_bits(self.read_i64()? as u64))
    }

    /// 写入单字节并推进写游标。
    pub fn write_u8(&mut self, value: u8) -> crate::Result<(), CoreError> {
        self.ensure_can_write(1)?;
        self.storage[self.write_index] = value;
        self.write_index += 1;
        Ok(())
    }

    /// 写入布尔值：真为 1，假为 0。
    pub fn write_bool(&mut self, value: bool) -> crate::Result<(), CoreError> {
        self.write_u8(if value { 1 } else { 0 })
    }

    /// 写入网络字节序 `i16`。
    pub fn write_i16(&mut self, value: i16) -> crate::Result<(), CoreError> {
        self.ensure_can_write(2)?;
        self.set_i16_at(self.write_index, value)?;
        self.write_index += 2;
        Ok(())
    }

    /// 写入网络字节序 `i32`。
    pub fn write_i32(&mut self, value: i32) -> crate::Result<(), CoreError> {
        self.ensure_can_write(4)?;
        self.set_i32_at(self.write_index, value)?;
        self.write_index += 4;
        Ok(())
    }

    /// 写入网络字节序 `i64`。
    pub fn write_i64(&mut self, value: i64) -> crate::Result<(), CoreError> {
        self.ensure_can_write(8)?;
        self.set_i64_at(self.write_index, value)?;
        self.write_index += 8;
        Ok(())
    }

    /// 写入 `f32`，按 `i32` 位模式落盘。
    pub fn write_f32(&mut self, value: f32) -> crate::Result<(), CoreError> {
        self.write_i32(value.to_bits() as i32)
    }

    /// 写入 `f64`，按 `i64` 位模式落盘。
    pub fn write_f64(&mut self, value: f64) -> crate::Result<(), CoreError> {
        self.write_i64(value.to_bits() as i64)
    }

    /// 写入整段切片。
    pub fn write_slice(&mut self, src: &[u8]) -> crate::Result<(), CoreError> {
        self.ensure_can_write(src.len())?;
        self.storage[self.write_index..self.write_index + src.len()].copy_from_slice(src);
        self.write_index += src.len();
        Ok(())
    }

    /// 读出 `count` 字节为独立数组。
    pub fn read_byte_array(&mut self, count: usize) -> crate::Result<Vec<u8>, CoreError> {
        self.ensure_can_read(count)?;
        let start = self.read_index;
        self.read_index += count;
        Ok(self.storage[start..start + count].to_vec())
    }

    /// 读出前 `count` 字节为新的 `Chunk`。
    ///
    /// 返回值是独立拷贝（与 Clone 契约一致），源缓冲的读游标随之推进。
    pub fn read_chunk(&mut self, count: usize) -> crate::Result<Chunk, CoreError> {
        self.ensure_can_read(count)?;
        let start = self.read_index;
        self.read_index += count;
        Ok(Chunk::from_slice(&self.storage[start..start + count]))
    }

    /// 排空剩余可读字节。
    pub fn to_vec(&mut self) -> Vec<u8> {
        let result = self.readable().to_vec();
        self.read_index = self.write_index;
        result
    }

    /// 丢弃至多 `count` 字节（只推进读游标），返回实际丢弃数。
    pub fn discard(&mut self, count: usize) -> usize {
        let dropped = count.min(self.available_for_read());
        self.read_index += dropped;
        dropped
    }

}
