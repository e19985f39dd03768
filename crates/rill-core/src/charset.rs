//! 字符集解码协作方契约与内建的增量 UTF-8 实现。
//!
//! # 模块角色（Why）
//! - 文本内容按任意字节边界分块到达，多字节序列可能被切在块中间；
//!   解码方必须把尾部的不完整序列暂存，与下一块拼接后再产出字符；
//! - [`Decoder`] 把这一职责抽成对象安全的契约，[`Packet`](crate::Packet)
//!   的 `read_text_with` 与上层的流式文本读取共用同一实现。

use alloc::string::String;
use alloc::vec::Vec;

use crate::error::{CoreError, codes};

/// 增量解码契约：逐块喂入字节，产出已确定的字符。
///
/// # 契约说明（What）
/// - `decode` 消化一块字节，返回其中能完整解码的前缀对应的文本，
///   尾部未完成的序列由实现暂存；
/// - `flush` 在流终止时调用：若仍有暂存的半个序列，说明流在字符中间
///   被截断，实现必须报错；
/// - 两个方法都以 [`codes::TEXT_MALFORMED`] 报告编码违例。
pub trait Decoder {
    /// 解码一块字节，返回新确定的文本。
    fn decode(&mut self, bytes: &[u8]) -> crate::Result<String, CoreError>;

    /// 流终止收尾，返回可能残留的文本。
    fn flush(&mut self) -> crate::Result<String, CoreError>;
}

/// 内建的增量 UTF-8 解码器。
///
/// # 逻辑解析（How）
/// - 把暂存字节与新输入拼接后做一次整体校验：合法前缀立即产出；
/// - `Utf8Error::error_len() == None` 表示尾部是**可能**未完成的序列，
///   暂存待续（UTF-8 序列最长 4 字节，暂存不超过 3 字节）；
/// - `error_len()` 为 `Some` 则是确定的非法序列，当场报错。
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    carry: Vec<u8>,
}

impl Utf8Decoder {
    /// 创建空解码器。
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前暂存的未完成序列长度。
    pub fn pending(&self) -> usize {
        self.carry.len()
    }
}

impl Decoder for Utf8Decoder {
    fn decode(&mut self, bytes: &[u8]) -> crate::Result<String, CoreError> {
        if self.carry.is_empty() && bytes.is_empty() {
            return Ok(String::new());
        }
        let mut pending = core::mem::take(&mut self.carry);
        pending.extend_from_slice(bytes);

        match core::str::from_utf8(&pending) {
            Ok(text) => Ok(String::from(text)),
            Err(err) if err.error_len().is_none() => {
                let valid = err.valid_up_to();
                let text = String::from(
                    core::str::from_utf8(&pending[..valid]).expect("prefix validated above"),
                );
                self.carry.extend_from_slice(&pending[valid..]);
                Ok(text)
            }
            Err(err) => Err(CoreError::new(
                codes::TEXT_MALFORMED,
                alloc::format!("invalid UTF-8 sequence at byte {}", err.valid_up_to()),
            )),
        }
    }

    fn flush(&mut self) -> crate::Result<String, CoreError> {
        if self.carry.is_empty() {
            return Ok(String::new());
        }
        self.carry.clear();
        Err(CoreError::new(
            codes::TEXT_MALFORMED,
            "stream terminated inside a multi-byte UTF-8 sequence",
        ))
    }
}
